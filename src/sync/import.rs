//! Import of selected transcription versions into the target store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::report::{ImportSummary, UnitFailure, VersionOutcome, VersionStatus};
use super::{emit, external_id_for, resolve_record, ResolvedRecord, SyncError, SyncEvent};
use crate::cache::TranscriptionCache;
use crate::clients::{ClientError, SourceClient, TargetStore};
use crate::config::SyncConfig;
use crate::identifier::parse_external_id;
use crate::models::{IdentifierRecord, Image, OutputType};
use crate::selector::{select_versions, SelectedVersion};

/// Document metadata keys, written once per document per run.
pub const DOCUMENT_METADATA_FIELDS: [&str; 5] =
    ["scan_uuid", "scan_uri", "archief", "inventaris", "scan"];

/// Version metadata keys, written only when a version is new.
pub const VERSION_METADATA_FIELDS: [&str; 4] =
    ["transcriber", "version", "analyzed", "transcription_uuid"];

/// Mutable state of one run.
#[derive(Default)]
struct ImportRun {
    summary: ImportSummary,
    /// Documents whose metadata was already written during this run.
    documents_with_metadata: HashSet<Uuid>,
}

/// Drives the record -> image -> output type -> version traversal.
pub struct ImportOrchestrator {
    config: SyncConfig,
    source: Arc<dyn SourceClient>,
    target: Arc<dyn TargetStore>,
    cache: TranscriptionCache,
    events: Option<UnboundedSender<SyncEvent>>,
}

impl ImportOrchestrator {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SourceClient>,
        target: Arc<dyn TargetStore>,
        cache: TranscriptionCache,
    ) -> Self {
        Self {
            config,
            source,
            target,
            cache,
            events: None,
        }
    }

    /// Send progress events to `tx` while running.
    pub fn with_events(mut self, tx: UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn cache(&self) -> &TranscriptionCache {
        &self.cache
    }

    /// Make sure every configured output type exists in the target store.
    pub async fn resolve_output_types(&self) -> Result<Vec<OutputType>, ClientError> {
        let mut types = Vec::with_capacity(self.config.output_types.len());
        for configured in &self.config.output_types {
            let output_type = self
                .target
                .create_type(&configured.name, &configured.mimetype)
                .await?;
            debug!("Output type {} has id {}", output_type.name, output_type.id);
            types.push(output_type);
        }
        Ok(types)
    }

    /// Import every record in order.
    ///
    /// Only a failure to resolve the output types (before any record is
    /// touched) is returned as an error. Everything else ends up in the
    /// summary.
    pub async fn run(&self, records: &[IdentifierRecord]) -> Result<ImportSummary, ClientError> {
        let types = self.resolve_output_types().await?;
        let mut run = ImportRun::default();
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

            let created_before = run.summary.versions_created;
            let result = self.import_record(identifier, &types, &mut run).await;
            run.summary.records_processed += 1;

            match result {
                Ok(()) => {
                    info!(
                        "{}: {} new versions",
                        identifier,
                        run.summary.versions_created - created_before
                    );
                    emit(
                        &self.events,
                        SyncEvent::RecordFinished {
                            identifier: identifier.to_string(),
                            succeeded: true,
                        },
                    );
                }
                Err(e) => {
                    error!("Failed to import {}: {}", identifier, e);
                    run.summary.failures.push(UnitFailure::record(identifier, &e));
                    emit(
                        &self.events,
                        SyncEvent::RecordFinished {
                            identifier: identifier.to_string(),
                            succeeded: false,
                        },
                    );

                    let delay = self.config.record_failure_delay;
                    if !delay.is_zero() && index + 1 < total {
                        debug!("Waiting {:?} before the next record", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        info!(
            "Import finished: {} records, {} new versions, {} failures",
            run.summary.records_processed,
            run.summary.versions_created,
            run.summary.failures.len() + run.summary.failed_versions().count()
        );
        Ok(run.summary)
    }

    async fn import_record(
        &self,
        identifier: &str,
        types: &[OutputType],
        run: &mut ImportRun,
    ) -> Result<(), SyncError> {
        let resolved = resolve_record(self.source.as_ref(), identifier).await?;

        for image in &resolved.images {
            if let Err(e) = self.import_image(&resolved, image, types, run).await {
                warn!(
                    "Skipping image {} of {}: {}",
                    image.uuid, resolved.identifier, e
                );
                run.summary
                    .failures
                    .push(UnitFailure::image(&resolved.identifier, image.uuid, &e));
            }
        }

        Ok(())
    }

    async fn import_image(
        &self,
        resolved: &ResolvedRecord,
        image: &Image,
        types: &[OutputType],
        run: &mut ImportRun,
    ) -> Result<(), SyncError> {
        let external_id = external_id_for(&resolved.identifier, image)?;
        let versions = self
            .cache
            .get_or_fetch(&image.uuid, || {
                self.source.list_transcription_versions(&image.uuid)
            })
            .await?;

        for output_type in types {
            let selected = select_versions(&versions, output_type, &self.config.selection);
            if selected.is_empty() {
                debug!("{}: no {} versions", external_id, output_type.name);
                continue;
            }

            for candidate in selected {
                let status = match self
                    .import_version(
                        &resolved.identifier,
                        &external_id,
                        image,
                        output_type,
                        candidate,
                        run,
                    )
                    .await
                {
                    Ok(true) => {
                        run.summary.versions_created += 1;
                        VersionStatus::Created
                    }
                    Ok(false) => VersionStatus::Unchanged,
                    Err(e) => {
                        warn!(
                            "Failed to import version {} of image {} ({}, {}): {}",
                            candidate.version.uuid,
                            image.uuid,
                            resolved.identifier,
                            output_type.name,
                            e
                        );
                        VersionStatus::Failed(e.to_string())
                    }
                };

                run.summary.versions.push(VersionOutcome {
                    identifier: resolved.identifier.clone(),
                    external_id: external_id.clone(),
                    image_uuid: image.uuid,
                    version_uuid: candidate.version.uuid,
                    type_name: output_type.name.clone(),
                    is_latest: candidate.is_latest,
                    status,
                });
            }
        }

        Ok(())
    }

    /// Push one version. Returns whether the target store created it.
    ///
    /// Version metadata is written before document metadata, so a created
    /// version never ends up without its metadata. A failed document
    /// metadata write is recorded against the image and retried by the next
    /// import into the same document.
    async fn import_version(
        &self,
        identifier: &str,
        external_id: &str,
        image: &Image,
        output_type: &OutputType,
        candidate: SelectedVersion<'_>,
        run: &mut ImportRun,
    ) -> Result<bool, SyncError> {
        let version = candidate.version;
        let contents = version.result.as_deref().unwrap_or_default();
        if version.result.is_none() {
            debug!("Version {} has no result, importing empty contents", version.uuid);
        }

        let imported = self
            .target
            .import_version(&output_type.name, external_id, contents, candidate.is_latest)
            .await?;

        if imported.new_version {
            self.write_version_metadata(&imported.version_id, candidate)
                .await?;
            debug!(
                "{} {}: created version {} (latest: {})",
                external_id, output_type.name, imported.version_id, candidate.is_latest
            );
        } else {
            debug!(
                "{} {}: version {} already present",
                external_id, output_type.name, version.uuid
            );
        }

        if !run.documents_with_metadata.contains(&imported.document_id) {
            match self
                .write_document_metadata(&imported.document_id, image, external_id)
                .await
            {
                Ok(()) => {
                    run.documents_with_metadata.insert(imported.document_id);
                }
                Err(e) => {
                    warn!(
                        "Failed to write document metadata for {} (image {}): {}",
                        external_id, image.uuid, e
                    );
                    run.summary.failures.push(UnitFailure::image(
                        identifier,
                        image.uuid,
                        format!("document metadata: {e}"),
                    ));
                }
            }
        }

        Ok(imported.new_version)
    }

    async fn write_version_metadata(
        &self,
        version_id: &Uuid,
        candidate: SelectedVersion<'_>,
    ) -> Result<(), SyncError> {
        let version = candidate.version;
        let analyzed = version.analyzed.to_rfc3339();
        let transcription_uuid = version.uuid.to_string();
        let values = [
            Some(version.transcriber.as_str()),
            version.transcriber_version.as_deref(),
            Some(analyzed.as_str()),
            Some(transcription_uuid.as_str()),
        ];
        for (key, value) in VERSION_METADATA_FIELDS.iter().zip(values) {
            // Transcribers without a version label get no "version" entry
            if let Some(value) = value {
                self.target
                    .create_version_metadata(version_id, key, value)
                    .await?;
            }
        }
        Ok(())
    }

    async fn write_document_metadata(
        &self,
        document_id: &Uuid,
        image: &Image,
        external_id: &str,
    ) -> Result<(), SyncError> {
        let parts = parse_external_id(external_id)?;
        let scan_uuid = image.uuid.to_string();
        let values = [
            scan_uuid.as_str(),
            image.remoteuri.as_str(),
            parts.archief.as_str(),
            parts.inventaris.as_str(),
            parts.scan.as_str(),
        ];

        for (key, value) in DOCUMENT_METADATA_FIELDS.iter().zip(values) {
            self.target
                .create_document_metadata(document_id, key, value)
                .await?;
        }
        Ok(())
    }
}
