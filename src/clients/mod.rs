//! Collaborators of the synchronization core: the source service and the
//! target store.
//!
//! The core only sees the [`SourceClient`] and [`TargetStore`] traits. HTTP
//! implementations talk to the real services; the in-memory ones honour the
//! same contracts and are used to exercise the orchestrators in tests.

mod http;
mod memory;
mod source;
mod target;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Image, ImageSet, ImportedVersion, OutputType, TargetDocument, TargetFile,
    TranscriptionVersion,
};

pub use http::HttpClientConfig;
pub use memory::{MemorySourceClient, MemoryTargetStore};
pub use source::HttpSourceClient;
pub use target::HttpTargetStore;

/// Errors from either remote service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-2xx status.
    #[error("{url} returned {status}: {body}")]
    Remote {
        status: u16,
        body: String,
        url: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// HTTP status of a remote error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Read access to the image/transcription service.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn list_image_sets(&self) -> ClientResult<Vec<ImageSet>>;

    async fn list_images(&self, set_uuid: &Uuid) -> ClientResult<Vec<Image>>;

    async fn list_transcription_versions(
        &self,
        image_uuid: &Uuid,
    ) -> ClientResult<Vec<TranscriptionVersion>>;
}

/// Write access to the versioned document repository.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn list_types(&self) -> ClientResult<Vec<OutputType>>;

    /// Create a type, or return the existing type with the same name.
    async fn create_type(&self, name: &str, mimetype: &str) -> ClientResult<OutputType>;

    /// Import contents as a version of the `type_name` file of the document
    /// known by `external_id`. Identical contents do not create a new version.
    async fn import_version(
        &self,
        type_name: &str,
        external_id: &str,
        contents: &str,
        as_latest: bool,
    ) -> ClientResult<ImportedVersion>;

    async fn create_document_metadata(
        &self,
        document_id: &Uuid,
        key: &str,
        value: &str,
    ) -> ClientResult<()>;

    async fn create_version_metadata(
        &self,
        version_id: &Uuid,
        key: &str,
        value: &str,
    ) -> ClientResult<()>;

    async fn find_document_by_external_id(
        &self,
        external_id: &str,
    ) -> ClientResult<Option<TargetDocument>>;

    async fn list_files(&self, document_id: &Uuid) -> ClientResult<Vec<TargetFile>>;

    async fn delete_file(&self, file_id: &Uuid) -> ClientResult<bool>;

    async fn delete_document(&self, document_id: &Uuid) -> ClientResult<bool>;
}
