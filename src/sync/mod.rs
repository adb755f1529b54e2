//! Import and deletion runs.
//!
//! Both runs walk the same traversal: identifier record, its image set in
//! the source service, and every image in that set. Work is strictly
//! sequential so versions of one file always reach the target store oldest
//! first, with the latest one last.
//!
//! Failures are isolated to the smallest unit of work and collected in the
//! run summary; a run only returns `Err` when it cannot start at all.

mod delete;
mod import;
mod report;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::clients::{ClientError, SourceClient};
use crate::identifier::{self, IdentifierError};
use crate::models::{Image, ImageSet};

pub use delete::DeletionOrchestrator;
pub use import::{ImportOrchestrator, DOCUMENT_METADATA_FIELDS, VERSION_METADATA_FIELDS};
pub use report::{
    DeletionOutcome, DeletionStatus, DeletionSummary, ImportSummary, UnitFailure, VersionOutcome,
    VersionStatus,
};

/// Failure of one record, image or version.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Progress notifications for a running import or deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    RecordStarted {
        index: usize,
        total: usize,
        identifier: String,
    },
    RecordFinished {
        identifier: String,
        succeeded: bool,
    },
}

pub(crate) fn emit(events: &Option<UnboundedSender<SyncEvent>>, event: SyncEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is watching progress.
        let _ = tx.send(event);
    }
}

/// An identifier resolved to its image set and images.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub identifier: String,
    pub archief: String,
    pub inventaris: String,
    pub image_set: ImageSet,
    pub images: Vec<Image>,
}

/// Resolve an identifier to the images of its unique image set.
pub async fn resolve_record(
    source: &dyn SourceClient,
    identifier: &str,
) -> Result<ResolvedRecord, SyncError> {
    let parts = identifier::extract_archief_and_inventaris(identifier)?;
    let sets = source.list_image_sets().await?;
    let image_set = identifier::find_image_set(&sets, &parts.archief, &parts.inventaris)?.clone();
    let images = source.list_images(&image_set.uuid).await?;

    debug!(
        "{}: image set {} ({}) has {} images",
        identifier,
        image_set.uuid,
        image_set.uri,
        images.len()
    );

    Ok(ResolvedRecord {
        identifier: identifier.to_string(),
        archief: parts.archief,
        inventaris: parts.inventaris,
        image_set,
        images,
    })
}

/// External ID of an image within a record.
pub fn external_id_for(identifier: &str, image: &Image) -> Result<String, IdentifierError> {
    let scan = identifier::scan_from_remote_uri(&image.remoteuri)?;
    identifier::create_external_id(identifier, &scan)
}
