//! Shared helper functions for CLI commands.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use super::RecordArgs;
use crate::cache::{PurgeOverThreshold, SqliteCacheStore, TranscriptionCache};
use crate::clients::{HttpSourceClient, HttpTargetStore, SourceClient, TargetStore};
use crate::config::Settings;
use crate::models::IdentifierRecord;
use crate::records::{load_records, records_from_identifiers};
use crate::sync::SyncEvent;

/// Records from `--csv` or the `--identifier` list.
pub fn load_record_args(args: &RecordArgs) -> anyhow::Result<Vec<IdentifierRecord>> {
    match &args.csv {
        Some(path) => load_records(path),
        None => Ok(records_from_identifiers(&args.identifiers)),
    }
}

pub fn source_client(settings: &Settings) -> anyhow::Result<Arc<dyn SourceClient>> {
    let config = settings.source_client_config()?;
    let client = HttpSourceClient::new(&config)
        .with_context(|| format!("Failed to create client for {}", config.base_url))?;
    Ok(Arc::new(client))
}

pub fn target_store(settings: &Settings) -> anyhow::Result<Arc<dyn TargetStore>> {
    let config = settings.target_client_config()?;
    let store = HttpTargetStore::new(&config)
        .with_context(|| format!("Failed to create client for {}", config.base_url))?;
    Ok(Arc::new(store))
}

/// Open the on-disk transcription cache with the configured threshold.
pub fn open_cache(settings: &Settings) -> anyhow::Result<TranscriptionCache> {
    let path = settings.cache_path();
    let store = SqliteCacheStore::open(&path)
        .with_context(|| format!("Failed to open transcription cache {}", path.display()))?;
    Ok(TranscriptionCache::with_policy(
        store,
        PurgeOverThreshold {
            threshold: settings.cache_threshold,
        },
    ))
}

/// Progress bar driven by [`SyncEvent`]s.
///
/// The bar finishes once every sender is dropped.
pub fn spawn_progress(total: usize) -> (UnboundedSender<SyncEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SyncEvent::RecordStarted { identifier, .. } => bar.set_message(identifier),
                SyncEvent::RecordFinished { .. } => bar.inc(1),
            }
        }
        bar.finish_and_clear();
    });

    (tx, handle)
}

/// Ask a yes/no question on stdin. Anything but "y" is no.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Truncate a string to `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
