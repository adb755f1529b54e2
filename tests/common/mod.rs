//! Shared fixtures for the pipeline tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use scansync::cache::TranscriptionCache;
use scansync::clients::{MemorySourceClient, MemoryTargetStore};
use scansync::config::{OutputTypeConfig, SyncConfig};
use scansync::models::TranscriptionVersion;
use scansync::sync::{DeletionOrchestrator, ImportOrchestrator};

pub const IDENTIFIER: &str = "NL-HaNA_1.10.94_0455";
pub const ARCHIEF: &str = "1.10.94";
pub const INVENTARIS: &str = "0455";

pub struct Fixture {
    pub source: Arc<MemorySourceClient>,
    pub target: Arc<MemoryTargetStore>,
    pub set: Uuid,
}

impl Fixture {
    /// Source service with one image set for [`IDENTIFIER`].
    pub fn new() -> Self {
        let source = Arc::new(MemorySourceClient::new());
        let set = source.add_image_set("https://scans.example.org/sets/NL-HaNA_1.10.94/455");
        Self {
            source,
            target: Arc::new(MemoryTargetStore::new()),
            set,
        }
    }

    /// Add a scan to the set and return its image UUID.
    pub fn add_scan(&self, scan: &str) -> Uuid {
        self.source.add_image(self.set, &remote_uri(scan))
    }

    pub fn importer(&self) -> ImportOrchestrator {
        self.importer_with(sync_config())
    }

    pub fn importer_with(&self, config: SyncConfig) -> ImportOrchestrator {
        ImportOrchestrator::new(
            config,
            self.source.clone(),
            self.target.clone(),
            TranscriptionCache::in_memory(),
        )
    }

    pub fn deleter(&self) -> DeletionOrchestrator {
        DeletionOrchestrator::new(self.source.clone(), self.target.clone())
    }
}

pub fn remote_uri(scan: &str) -> String {
    format!("https://scans.example.org/iiif/NL-HaNA_{ARCHIEF}_{INVENTARIS}_{scan}.jpg")
}

pub fn external_id(scan: &str) -> String {
    format!("{IDENTIFIER}_{scan}")
}

/// Default types and policy, without the pause after failed records.
pub fn sync_config() -> SyncConfig {
    SyncConfig {
        record_failure_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub fn pagexml_only() -> SyncConfig {
    SyncConfig {
        output_types: vec![OutputTypeConfig::new("pagexml", "application/vnd.prima.page+xml")],
        ..sync_config()
    }
}

/// A version whose result is `"{transcriber}@{analyzed}"`.
pub fn version(transcriber: &str, analyzed: i64) -> TranscriptionVersion {
    TranscriptionVersion {
        uuid: Uuid::new_v4(),
        transcriber: transcriber.to_string(),
        transcriber_version: Some("1.0".to_string()),
        status: None,
        analyzed: Utc.timestamp_opt(analyzed, 0).unwrap(),
        result: Some(contents(transcriber, analyzed)),
    }
}

pub fn contents(transcriber: &str, analyzed: i64) -> String {
    format!("{transcriber}@{analyzed}")
}
