//! Typed payloads exchanged with the source service and the target store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of batch input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub identifier: String,
}

impl IdentifierRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// A group of scans for one archief/inventaris pair in the source service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    pub uuid: Uuid,
    pub uri: String,
}

/// A single scan in the source service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub uuid: Uuid,
    pub remoteuri: String,
}

/// One transcription of a scan, as produced by a transcriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionVersion {
    pub uuid: Uuid,
    pub transcriber: String,
    /// Version label of the transcriber, when it reports one.
    #[serde(default, rename = "version", skip_serializing_if = "Option::is_none")]
    pub transcriber_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub analyzed: DateTime<Utc>,
    #[serde(default)]
    pub result: Option<String>,
}

/// A file type known to the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputType {
    pub id: i64,
    pub name: String,
    pub mimetype: String,
}

/// Result of the target store's import operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedVersion {
    pub document_id: Uuid,
    pub file_id: Uuid,
    pub version_id: Uuid,
    pub new_version: bool,
}

/// A document in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDocument {
    pub id: Uuid,
    pub external_id: String,
}

/// A file of a document in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetFile {
    pub id: Uuid,
    #[serde(default)]
    pub type_id: Option<i64>,
}
