//! In-memory source service and target store.
//!
//! Both keep the contracts of their HTTP counterparts: the target store
//! detects duplicate contents per file by SHA-256 and keeps at most one
//! latest version per file. Failures can be injected per call site.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{ClientError, ClientResult, SourceClient, TargetStore};
use crate::models::{
    Image, ImageSet, ImportedVersion, OutputType, TargetDocument, TargetFile,
    TranscriptionVersion,
};

fn injected_failure(what: &str) -> ClientError {
    ClientError::Remote {
        status: 500,
        body: format!("injected failure: {what}"),
        url: format!("memory://{what}"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock only happens inside a failing test.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Source service
// ============================================================================

#[derive(Debug, Default)]
struct SourceState {
    sets: Vec<ImageSet>,
    images: HashMap<Uuid, Vec<Image>>,
    versions: HashMap<Uuid, Vec<TranscriptionVersion>>,
    failing_images: HashSet<Uuid>,
    version_fetches: usize,
}

/// In-memory [`SourceClient`].
#[derive(Debug, Default)]
pub struct MemorySourceClient {
    state: Mutex<SourceState>,
}

impl MemorySourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image set and return its UUID.
    pub fn add_image_set(&self, uri: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        lock(&self.state).sets.push(ImageSet {
            uuid,
            uri: uri.to_string(),
        });
        uuid
    }

    /// Register an image in a set and return its UUID.
    pub fn add_image(&self, set: Uuid, remoteuri: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        lock(&self.state).images.entry(set).or_default().push(Image {
            uuid,
            remoteuri: remoteuri.to_string(),
        });
        uuid
    }

    pub fn add_version(&self, image: Uuid, version: TranscriptionVersion) {
        lock(&self.state)
            .versions
            .entry(image)
            .or_default()
            .push(version);
    }

    /// Make transcription lookups for `image` fail.
    pub fn fail_versions_for(&self, image: Uuid) {
        lock(&self.state).failing_images.insert(image);
    }

    /// Number of transcription lookups served so far.
    pub fn version_fetches(&self) -> usize {
        lock(&self.state).version_fetches
    }
}

#[async_trait]
impl SourceClient for MemorySourceClient {
    async fn list_image_sets(&self) -> ClientResult<Vec<ImageSet>> {
        Ok(lock(&self.state).sets.clone())
    }

    async fn list_images(&self, set_uuid: &Uuid) -> ClientResult<Vec<Image>> {
        Ok(lock(&self.state)
            .images
            .get(set_uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_transcription_versions(
        &self,
        image_uuid: &Uuid,
    ) -> ClientResult<Vec<TranscriptionVersion>> {
        let mut state = lock(&self.state);
        state.version_fetches += 1;
        if state.failing_images.contains(image_uuid) {
            return Err(injected_failure("transcriptions"));
        }
        Ok(state.versions.get(image_uuid).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Target store
// ============================================================================

#[derive(Debug, Clone)]
struct StoredVersion {
    id: Uuid,
    hash: String,
    contents: String,
    latest: bool,
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    id: Uuid,
    type_id: i64,
    versions: Vec<StoredVersion>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    id: Uuid,
    external_id: String,
    metadata: BTreeMap<String, String>,
    files: BTreeMap<String, StoredFile>,
}

#[derive(Debug, Default)]
struct TargetState {
    types: Vec<OutputType>,
    documents: Vec<StoredDocument>,
    rejected_contents: HashSet<String>,
    undeletable_files: HashSet<Uuid>,
    failing_lookups: HashSet<String>,
    refuse_types: bool,
    import_calls: usize,
    document_metadata_writes: usize,
    version_metadata_writes: usize,
}

impl TargetState {
    fn document_mut(&mut self, id: &Uuid) -> Option<&mut StoredDocument> {
        self.documents.iter_mut().find(|d| &d.id == id)
    }

    fn by_external_id(&self, external_id: &str) -> Option<&StoredDocument> {
        self.documents.iter().find(|d| d.external_id == external_id)
    }
}

/// In-memory [`TargetStore`].
#[derive(Debug, Default)]
pub struct MemoryTargetStore {
    state: Mutex<TargetState>,
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make imports of exactly these contents fail.
    pub fn reject_contents(&self, contents: &str) {
        lock(&self.state)
            .rejected_contents
            .insert(contents.to_string());
    }

    /// Make deletion of this file report failure.
    pub fn refuse_file_deletion(&self, file_id: Uuid) {
        lock(&self.state).undeletable_files.insert(file_id);
    }

    /// Make every type creation fail.
    pub fn refuse_type_creation(&self) {
        lock(&self.state).refuse_types = true;
    }

    /// Make lookups of this external ID fail.
    pub fn fail_lookup_of(&self, external_id: &str) {
        lock(&self.state)
            .failing_lookups
            .insert(external_id.to_string());
    }

    pub fn import_calls(&self) -> usize {
        lock(&self.state).import_calls
    }

    pub fn document_metadata_writes(&self) -> usize {
        lock(&self.state).document_metadata_writes
    }

    pub fn version_metadata_writes(&self) -> usize {
        lock(&self.state).version_metadata_writes
    }

    pub fn document_count(&self) -> usize {
        lock(&self.state).documents.len()
    }

    pub fn has_document(&self, external_id: &str) -> bool {
        lock(&self.state).by_external_id(external_id).is_some()
    }

    pub fn file_ids(&self, external_id: &str) -> Vec<Uuid> {
        lock(&self.state)
            .by_external_id(external_id)
            .map(|d| d.files.values().map(|f| f.id).collect())
            .unwrap_or_default()
    }

    /// Contents of every version of a file, oldest first.
    pub fn version_contents(&self, external_id: &str, type_name: &str) -> Vec<String> {
        lock(&self.state)
            .by_external_id(external_id)
            .and_then(|d| d.files.get(type_name))
            .map(|f| f.versions.iter().map(|v| v.contents.clone()).collect())
            .unwrap_or_default()
    }

    /// Contents of the version flagged latest, if any.
    pub fn latest_contents(&self, external_id: &str, type_name: &str) -> Option<String> {
        lock(&self.state)
            .by_external_id(external_id)
            .and_then(|d| d.files.get(type_name))
            .and_then(|f| f.versions.iter().find(|v| v.latest))
            .map(|v| v.contents.clone())
    }

    /// Number of versions flagged latest in a file.
    pub fn latest_count(&self, external_id: &str, type_name: &str) -> usize {
        lock(&self.state)
            .by_external_id(external_id)
            .and_then(|d| d.files.get(type_name))
            .map(|f| f.versions.iter().filter(|v| v.latest).count())
            .unwrap_or(0)
    }

    pub fn document_metadata(&self, external_id: &str) -> BTreeMap<String, String> {
        lock(&self.state)
            .by_external_id(external_id)
            .map(|d| d.metadata.clone())
            .unwrap_or_default()
    }

    /// Metadata of the version with the given contents.
    pub fn version_metadata(
        &self,
        external_id: &str,
        type_name: &str,
        contents: &str,
    ) -> BTreeMap<String, String> {
        lock(&self.state)
            .by_external_id(external_id)
            .and_then(|d| d.files.get(type_name))
            .and_then(|f| f.versions.iter().find(|v| v.contents == contents))
            .map(|v| v.metadata.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn list_types(&self) -> ClientResult<Vec<OutputType>> {
        Ok(lock(&self.state).types.clone())
    }

    async fn create_type(&self, name: &str, mimetype: &str) -> ClientResult<OutputType> {
        let mut state = lock(&self.state);
        if state.refuse_types {
            return Err(injected_failure("create type"));
        }
        if let Some(existing) = state.types.iter().find(|t| t.name == name) {
            return Ok(existing.clone());
        }
        let output_type = OutputType {
            id: state.types.len() as i64 + 1,
            name: name.to_string(),
            mimetype: mimetype.to_string(),
        };
        state.types.push(output_type.clone());
        Ok(output_type)
    }

    async fn import_version(
        &self,
        type_name: &str,
        external_id: &str,
        contents: &str,
        as_latest: bool,
    ) -> ClientResult<ImportedVersion> {
        let mut state = lock(&self.state);
        state.import_calls += 1;

        if state.rejected_contents.contains(contents) {
            return Err(injected_failure("import"));
        }
        let type_id = state
            .types
            .iter()
            .find(|t| t.name == type_name)
            .map(|t| t.id)
            .ok_or_else(|| ClientError::Remote {
                status: 404,
                body: format!("type {type_name} not found"),
                url: "memory://import".to_string(),
            })?;

        let existing = state
            .documents
            .iter()
            .position(|d| d.external_id == external_id);
        let document_index = match existing {
            Some(index) => index,
            None => {
                state.documents.push(StoredDocument {
                    id: Uuid::new_v4(),
                    external_id: external_id.to_string(),
                    metadata: BTreeMap::new(),
                    files: BTreeMap::new(),
                });
                state.documents.len() - 1
            }
        };

        let document = &mut state.documents[document_index];
        let document_id = document.id;
        let file = document
            .files
            .entry(type_name.to_string())
            .or_insert_with(|| StoredFile {
                id: Uuid::new_v4(),
                type_id,
                versions: Vec::new(),
            });

        let hash = hex::encode(Sha256::digest(contents.as_bytes()));
        let duplicate = file.versions.iter().position(|v| v.hash == hash);
        let (version_index, new_version) = match duplicate {
            Some(index) => (index, false),
            None => {
                file.versions.push(StoredVersion {
                    id: Uuid::new_v4(),
                    hash,
                    contents: contents.to_string(),
                    latest: false,
                    metadata: BTreeMap::new(),
                });
                (file.versions.len() - 1, true)
            }
        };

        if as_latest {
            for (i, version) in file.versions.iter_mut().enumerate() {
                version.latest = i == version_index;
            }
        }

        Ok(ImportedVersion {
            document_id,
            file_id: file.id,
            version_id: file.versions[version_index].id,
            new_version,
        })
    }

    async fn create_document_metadata(
        &self,
        document_id: &Uuid,
        key: &str,
        value: &str,
    ) -> ClientResult<()> {
        let mut state = lock(&self.state);
        state.document_metadata_writes += 1;
        let document = state
            .document_mut(document_id)
            .ok_or_else(|| injected_failure("document metadata"))?;
        document.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn create_version_metadata(
        &self,
        version_id: &Uuid,
        key: &str,
        value: &str,
    ) -> ClientResult<()> {
        let mut state = lock(&self.state);
        state.version_metadata_writes += 1;
        let version = state
            .documents
            .iter_mut()
            .flat_map(|d| d.files.values_mut())
            .flat_map(|f| f.versions.iter_mut())
            .find(|v| &v.id == version_id)
            .ok_or_else(|| injected_failure("version metadata"))?;
        version.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn find_document_by_external_id(
        &self,
        external_id: &str,
    ) -> ClientResult<Option<TargetDocument>> {
        let state = lock(&self.state);
        if state.failing_lookups.contains(external_id) {
            return Err(injected_failure("find document"));
        }
        Ok(state.by_external_id(external_id).map(|d| TargetDocument {
            id: d.id,
            external_id: d.external_id.clone(),
        }))
    }

    async fn list_files(&self, document_id: &Uuid) -> ClientResult<Vec<TargetFile>> {
        let state = lock(&self.state);
        Ok(state
            .documents
            .iter()
            .find(|d| &d.id == document_id)
            .map(|d| {
                d.files
                    .values()
                    .map(|f| TargetFile {
                        id: f.id,
                        type_id: Some(f.type_id),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_file(&self, file_id: &Uuid) -> ClientResult<bool> {
        let mut state = lock(&self.state);
        if state.undeletable_files.contains(file_id) {
            return Ok(false);
        }
        for document in state.documents.iter_mut() {
            let before = document.files.len();
            document.files.retain(|_, f| &f.id != file_id);
            if document.files.len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn delete_document(&self, document_id: &Uuid) -> ClientResult<bool> {
        let mut state = lock(&self.state);
        let before = state.documents.len();
        state.documents.retain(|d| &d.id != document_id);
        Ok(state.documents.len() != before)
    }
}
