//! Per-unit outcomes and run summaries.

use uuid::Uuid;

/// What happened to one selected transcription version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStatus {
    /// The target store created a new version.
    Created,
    /// The target store already had identical contents.
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOutcome {
    pub identifier: String,
    pub external_id: String,
    pub image_uuid: Uuid,
    pub version_uuid: Uuid,
    pub type_name: String,
    pub is_latest: bool,
    pub status: VersionStatus,
}

impl VersionOutcome {
    pub fn is_imported(&self) -> bool {
        !matches!(self.status, VersionStatus::Failed(_))
    }
}

/// A record or image that could not be processed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub identifier: String,
    /// Set when only one image of the record failed.
    pub image_uuid: Option<Uuid>,
    pub reason: String,
}

impl UnitFailure {
    pub fn record(identifier: &str, reason: impl ToString) -> Self {
        Self {
            identifier: identifier.to_string(),
            image_uuid: None,
            reason: reason.to_string(),
        }
    }

    pub fn image(identifier: &str, image_uuid: Uuid, reason: impl ToString) -> Self {
        Self {
            identifier: identifier.to_string(),
            image_uuid: Some(image_uuid),
            reason: reason.to_string(),
        }
    }
}

/// Summary of an import run.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub records_processed: usize,
    pub versions: Vec<VersionOutcome>,
    pub failures: Vec<UnitFailure>,
    /// Versions newly created in the target store during this run.
    pub versions_created: usize,
}

impl ImportSummary {
    pub fn imported(&self) -> impl Iterator<Item = &VersionOutcome> {
        self.versions.iter().filter(|v| v.is_imported())
    }

    pub fn failed_versions(&self) -> impl Iterator<Item = &VersionOutcome> {
        self.versions.iter().filter(|v| !v.is_imported())
    }

    pub fn unchanged_count(&self) -> usize {
        self.versions
            .iter()
            .filter(|v| v.status == VersionStatus::Unchanged)
            .count()
    }

    /// True when no record, image or version failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.failed_versions().next().is_none()
    }
}

/// What happened to one external ID during deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Deleted,
    /// No document existed; nothing to do.
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub identifier: String,
    pub external_id: String,
    pub status: DeletionStatus,
}

/// Summary of a deletion run.
#[derive(Debug, Clone)]
pub struct DeletionSummary {
    pub outcomes: Vec<DeletionOutcome>,
    pub failures: Vec<UnitFailure>,
    /// True only if every file and document deletion succeeded.
    pub all_succeeded: bool,
}

impl Default for DeletionSummary {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
            failures: Vec::new(),
            all_succeeded: true,
        }
    }
}

impl DeletionSummary {
    pub fn processed_external_ids(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.external_id.as_str()).collect()
    }

    pub fn count(&self, status: &DeletionStatus) -> usize {
        self.outcomes.iter().filter(|o| &o.status == status).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeletionStatus::Failed(_)))
            .count()
    }
}
