//! Selection of the transcription versions to import for an output type.

use std::collections::HashSet;

use prefer::FromValue;
use serde::{Deserialize, Serialize};

use crate::models::{OutputType, TranscriptionVersion};

/// Transcriber whose versions are additionally filtered on status.
pub const DEFAULT_STATUS_FILTERED_TRANSCRIBER: &str = "Transkribus";

/// Statuses accepted from the status-filtered transcriber.
pub const DEFAULT_ALLOWED_STATUSES: [&str; 3] = ["GT", "Final", "IN_PROGRESS"];

/// A transcriber that produces files of one output type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, prefer::FromValue)]
pub struct TranscriberRule {
    pub transcriber: String,
    pub output_type: String,
}

impl TranscriberRule {
    pub fn new(transcriber: impl Into<String>, output_type: impl Into<String>) -> Self {
        Self {
            transcriber: transcriber.into(),
            output_type: output_type.into(),
        }
    }
}

/// Which transcribers feed which output type, plus the status allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub rules: Vec<TranscriberRule>,
    #[serde(default = "default_status_filtered_transcriber")]
    pub status_filtered_transcriber: String,
    #[serde(default = "default_allowed_statuses")]
    pub allowed_statuses: Vec<String>,
}

fn default_status_filtered_transcriber() -> String {
    DEFAULT_STATUS_FILTERED_TRANSCRIBER.to_string()
}

fn default_allowed_statuses() -> Vec<String> {
    DEFAULT_ALLOWED_STATUSES.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                TranscriberRule::new("Transkribus", "pagexml"),
                TranscriberRule::new("Loghi", "pagexml"),
                TranscriberRule::new("Tesseract4", "hocr"),
            ],
            status_filtered_transcriber: default_status_filtered_transcriber(),
            allowed_statuses: default_allowed_statuses(),
        }
    }
}

/// Read from a discovered config file. `rules` is required; the status
/// filter keys fall back to their defaults.
impl prefer::FromValue for SelectionPolicy {
    fn from_value(value: &prefer::ConfigValue) -> prefer::Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| prefer::Error::ConversionError {
                key: String::new(),
                type_name: "SelectionPolicy".to_string(),
                source: "expected object".into(),
            })?;

        let rules = obj
            .get("rules")
            .ok_or_else(|| prefer::Error::KeyNotFound("rules".to_string()))
            .and_then(Vec::<TranscriberRule>::from_value)
            .map_err(|e| e.with_key("rules"))?;
        let status_filtered_transcriber = match obj.get("status_filtered_transcriber") {
            Some(v) => {
                String::from_value(v).map_err(|e| e.with_key("status_filtered_transcriber"))?
            }
            None => default_status_filtered_transcriber(),
        };
        let allowed_statuses = match obj.get("allowed_statuses") {
            Some(v) => {
                Vec::<String>::from_value(v).map_err(|e| e.with_key("allowed_statuses"))?
            }
            None => default_allowed_statuses(),
        };

        Ok(Self {
            rules,
            status_filtered_transcriber,
            allowed_statuses,
        })
    }
}

impl SelectionPolicy {
    /// Transcribers whose rule targets the given output type name.
    pub fn transcribers_for(&self, type_name: &str) -> HashSet<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.output_type == type_name)
            .map(|rule| rule.transcriber.as_str())
            .collect()
    }

    fn status_allowed(&self, version: &TranscriptionVersion) -> bool {
        if version.transcriber != self.status_filtered_transcriber {
            return true;
        }
        version
            .status
            .as_deref()
            .is_some_and(|status| self.allowed_statuses.iter().any(|s| s == status))
    }
}

/// A version chosen for import, with its place in the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedVersion<'a> {
    pub version: &'a TranscriptionVersion,
    pub is_latest: bool,
}

/// Filter, order and flag the versions of one image for one output type.
///
/// The result is sorted oldest first by `analyzed`; only the last element is
/// flagged latest. An empty result means nothing to import.
pub fn select_versions<'a>(
    versions: &'a [TranscriptionVersion],
    output_type: &OutputType,
    policy: &SelectionPolicy,
) -> Vec<SelectedVersion<'a>> {
    let transcribers = policy.transcribers_for(&output_type.name);

    let mut relevant: Vec<&TranscriptionVersion> = versions
        .iter()
        .filter(|v| transcribers.contains(v.transcriber.as_str()))
        .filter(|v| policy.status_allowed(v))
        .collect();

    relevant.sort_by_key(|v| v.analyzed);

    let last = relevant.len().saturating_sub(1);
    relevant
        .into_iter()
        .enumerate()
        .map(|(i, version)| SelectedVersion {
            version,
            is_latest: i == last,
        })
        .collect()
}
