//! Removal of imported documents from the target store.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::report::{DeletionOutcome, DeletionStatus, DeletionSummary, UnitFailure};
use super::{emit, external_id_for, resolve_record, SyncError, SyncEvent};
use crate::clients::{SourceClient, TargetStore};
use crate::models::IdentifierRecord;

/// Deletes the documents belonging to identifier records.
///
/// A document is only deleted after all of its files were deleted.
pub struct DeletionOrchestrator {
    source: Arc<dyn SourceClient>,
    target: Arc<dyn TargetStore>,
    events: Option<UnboundedSender<SyncEvent>>,
}

impl DeletionOrchestrator {
    pub fn new(source: Arc<dyn SourceClient>, target: Arc<dyn TargetStore>) -> Self {
        Self {
            source,
            target,
            events: None,
        }
    }

    /// Send progress events to `tx` while running.
    pub fn with_events(mut self, tx: UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub async fn run(&self, records: &[IdentifierRecord]) -> DeletionSummary {
        let mut summary = DeletionSummary::default();
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            let identifier = record.identifier.as_str();
            emit(
                &self.events,
                SyncEvent::RecordStarted {
                    index,
                    total,
                    identifier: identifier.to_string(),
                },
            );

            let succeeded = match self.delete_record(identifier, &mut summary).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to delete {}: {}", identifier, e);
                    summary.failures.push(UnitFailure::record(identifier, &e));
                    false
                }
            };

            emit(
                &self.events,
                SyncEvent::RecordFinished {
                    identifier: identifier.to_string(),
                    succeeded,
                },
            );
        }

        summary.all_succeeded = summary.failures.is_empty() && summary.failed_count() == 0;
        info!(
            "Deletion finished: {} deleted, {} not found, {} failed",
            summary.count(&DeletionStatus::Deleted),
            summary.count(&DeletionStatus::NotFound),
            summary.failed_count() + summary.failures.len()
        );
        summary
    }

    async fn delete_record(
        &self,
        identifier: &str,
        summary: &mut DeletionSummary,
    ) -> Result<(), SyncError> {
        let resolved = resolve_record(self.source.as_ref(), identifier).await?;

        for image in &resolved.images {
            let external_id = match external_id_for(identifier, image) {
                Ok(external_id) => external_id,
                Err(e) => {
                    warn!("Skipping image {} of {}: {}", image.uuid, identifier, e);
                    summary
                        .failures
                        .push(UnitFailure::image(identifier, image.uuid, &e));
                    continue;
                }
            };

            let status = self.delete_external_id(&external_id).await;
            summary.outcomes.push(DeletionOutcome {
                identifier: identifier.to_string(),
                external_id,
                status,
            });
        }

        Ok(())
    }

    async fn delete_external_id(&self, external_id: &str) -> DeletionStatus {
        let document = match self.target.find_document_by_external_id(external_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!("{}: no document, nothing to delete", external_id);
                return DeletionStatus::NotFound;
            }
            Err(e) => {
                warn!("{}: document lookup failed: {}", external_id, e);
                return DeletionStatus::Failed(e.to_string());
            }
        };

        let files = match self.target.list_files(&document.id).await {
            Ok(files) => files,
            Err(e) => {
                warn!("{}: listing files failed: {}", external_id, e);
                return DeletionStatus::Failed(e.to_string());
            }
        };

        let mut undeleted = 0;
        for file in &files {
            match self.target.delete_file(&file.id).await {
                Ok(true) => debug!("{}: deleted file {}", external_id, file.id),
                Ok(false) => {
                    warn!("{}: file {} was not deleted", external_id, file.id);
                    undeleted += 1;
                }
                Err(e) => {
                    warn!("{}: deleting file {} failed: {}", external_id, file.id, e);
                    undeleted += 1;
                }
            }
        }

        if undeleted > 0 {
            return DeletionStatus::Failed(format!(
                "{undeleted} of {} files not deleted, document {} kept",
                files.len(),
                document.id
            ));
        }

        match self.target.delete_document(&document.id).await {
            Ok(true) => {
                info!("{}: deleted document {}", external_id, document.id);
                DeletionStatus::Deleted
            }
            Ok(false) => {
                warn!("{}: document {} was not deleted", external_id, document.id);
                DeletionStatus::Failed(format!("document {} was not deleted", document.id))
            }
            Err(e) => {
                warn!("{}: deleting document {} failed: {}", external_id, document.id, e);
                DeletionStatus::Failed(e.to_string())
            }
        }
    }
}
