//! Transcription cache in front of the source service.
//!
//! Entries map an image UUID to the serialized list of its transcription
//! versions. The backing store is pluggable ([`MemoryCacheStore`] for tests,
//! [`SqliteCacheStore`] on disk) and so is the eviction policy. The default
//! policy clears the whole cache once it holds more than 500 keys; it does
//! not evict per key.

mod memory;
mod sqlite;

use std::future::Future;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::TranscriptionVersion;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

/// Number of keys above which the default policy purges the cache.
pub const DEFAULT_CACHE_THRESHOLD: usize = 500;

/// Errors from cache storage.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(String),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Key/value storage behind the cache.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> CacheResult<()>;
    fn len(&self) -> CacheResult<usize>;
    fn clear(&self) -> CacheResult<()>;

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Decides when the cache has grown too large.
pub trait EvictionPolicy: Send + Sync {
    fn should_purge(&self, key_count: usize) -> bool;
}

/// Purge everything once the key count exceeds `threshold`.
///
/// The check runs right after each insert, so the insert that crosses the
/// threshold empties the cache, its own entry included. The next lookup of
/// any image, even the one just fetched, goes back to the source service.
#[derive(Debug, Clone, Copy)]
pub struct PurgeOverThreshold {
    pub threshold: usize,
}

impl Default for PurgeOverThreshold {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CACHE_THRESHOLD,
        }
    }
}

impl EvictionPolicy for PurgeOverThreshold {
    fn should_purge(&self, key_count: usize) -> bool {
        key_count > self.threshold
    }
}

/// Cache of transcription versions keyed by image UUID.
pub struct TranscriptionCache {
    store: Box<dyn CacheStore>,
    policy: Box<dyn EvictionPolicy>,
}

impl TranscriptionCache {
    /// Create a cache with the default purge-over-500 policy.
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self::with_policy(store, PurgeOverThreshold::default())
    }

    pub fn with_policy(
        store: impl CacheStore + 'static,
        policy: impl EvictionPolicy + 'static,
    ) -> Self {
        Self {
            store: Box::new(store),
            policy: Box::new(policy),
        }
    }

    /// In-memory cache, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(MemoryCacheStore::new())
    }

    pub fn get(&self, image_id: &Uuid) -> CacheResult<Option<Vec<TranscriptionVersion>>> {
        match self.store.get(&image_id.to_string())? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, image_id: &Uuid, versions: &[TranscriptionVersion]) -> CacheResult<()> {
        let raw = serde_json::to_string(versions)?;
        self.store.put(&image_id.to_string(), &raw)
    }

    pub fn len(&self) -> CacheResult<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        self.store.is_empty()
    }

    pub fn size_over_threshold(&self) -> CacheResult<bool> {
        Ok(self.policy.should_purge(self.store.len()?))
    }

    pub fn purge_all(&self) -> CacheResult<()> {
        self.store.clear()
    }

    /// Return the cached versions for an image, fetching and storing them on a miss.
    ///
    /// After storing, the whole cache is purged if the policy says it has
    /// grown too large, so the next insertion starts from an empty cache.
    /// Cache failures are logged and never fail the lookup itself.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        image_id: &Uuid,
        fetch: F,
    ) -> Result<Vec<TranscriptionVersion>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<TranscriptionVersion>, E>>,
    {
        match self.get(image_id) {
            Ok(Some(versions)) => {
                debug!("Cache hit for image {}", image_id);
                return Ok(versions);
            }
            Ok(None) => debug!("Cache miss for image {}", image_id),
            Err(e) => warn!("Ignoring unreadable cache entry for image {}: {}", image_id, e),
        }

        let versions = fetch().await?;

        if let Err(e) = self.put(image_id, &versions) {
            warn!("Failed to cache versions for image {}: {}", image_id, e);
        }
        match self.size_over_threshold() {
            Ok(true) => {
                info!("Transcription cache over threshold, purging all entries");
                if let Err(e) = self.purge_all() {
                    warn!("Failed to purge transcription cache: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to inspect transcription cache size: {}", e),
        }

        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn versions_for(n: i64) -> Vec<TranscriptionVersion> {
        vec![TranscriptionVersion {
            uuid: Uuid::new_v4(),
            transcriber: "Loghi".to_string(),
            transcriber_version: Some("2.0".to_string()),
            status: None,
            analyzed: Utc.timestamp_opt(n, 0).unwrap(),
            result: Some(format!("<PcGts>{n}</PcGts>")),
        }]
    }

    #[tokio::test]
    async fn test_get_or_fetch_hits_after_first_fetch() {
        let cache = TranscriptionCache::in_memory();
        let image = Uuid::new_v4();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let versions = cache
                .get_or_fetch(&image, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(versions_for(1))
                })
                .await
                .unwrap();
            assert_eq!(versions.len(), 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let cache = TranscriptionCache::in_memory();
        let image = Uuid::new_v4();

        let result = cache
            .get_or_fetch(&image, || async { Err::<Vec<TranscriptionVersion>, _>("boom") })
            .await;

        assert_eq!(result, Err("boom"));
        assert!(cache.get(&image).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purges_everything_past_threshold() {
        let cache = TranscriptionCache::in_memory();
        let images: Vec<Uuid> = (0..=DEFAULT_CACHE_THRESHOLD).map(|_| Uuid::new_v4()).collect();

        for (i, image) in images.iter().take(DEFAULT_CACHE_THRESHOLD).enumerate() {
            cache
                .get_or_fetch(image, || async { Ok::<_, Infallible>(versions_for(i as i64)) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len().unwrap(), DEFAULT_CACHE_THRESHOLD);
        assert!(cache.get(&images[0]).unwrap().is_some());

        // 501st insertion crosses the threshold
        cache
            .get_or_fetch(&images[DEFAULT_CACHE_THRESHOLD], || async {
                Ok::<_, Infallible>(versions_for(0))
            })
            .await
            .unwrap();

        assert!(cache.get(&images[0]).unwrap().is_none());
        assert!(cache.get(&images[DEFAULT_CACHE_THRESHOLD]).unwrap().is_none());
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn test_size_over_threshold_uses_policy() {
        let cache =
            TranscriptionCache::with_policy(MemoryCacheStore::new(), PurgeOverThreshold { threshold: 1 });
        cache.put(&Uuid::new_v4(), &versions_for(1)).unwrap();
        assert!(!cache.size_over_threshold().unwrap());
        cache.put(&Uuid::new_v4(), &versions_for(2)).unwrap();
        assert!(cache.size_over_threshold().unwrap());

        cache.purge_all().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_refetched() {
        let store = MemoryCacheStore::new();
        let image = Uuid::new_v4();
        store.put(&image.to_string(), "not json").unwrap();
        let cache = TranscriptionCache::new(store);

        let versions = cache
            .get_or_fetch(&image, || async { Ok::<_, Infallible>(versions_for(7)) })
            .await
            .unwrap();

        assert_eq!(versions[0].analyzed.timestamp(), 7);
        assert_eq!(cache.get(&image).unwrap().unwrap(), versions);
    }
}
