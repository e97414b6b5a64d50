//! Response cache: in-memory metadata over a storage backend

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pixgate_origin::{OriginMetadata, Revalidators};
use pixgate_storage::{StorageBackend, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::CoreError;

/// Configuration for the cache store
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Freshness TTL in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Revalidation metadata for one cached response.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl EntryMeta {
    /// Build entry metadata from a successful origin fetch.
    pub fn from_origin(meta: OriginMetadata, fetched_at: DateTime<Utc>) -> Self {
        Self {
            etag: meta.etag,
            last_modified: meta.last_modified,
            content_type: meta.content_type,
            cache_control: meta.cache_control,
            fetched_at,
        }
    }

    /// The conditional-GET validators this entry carries.
    pub fn revalidators(&self) -> Revalidators {
        Revalidators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }
}

/// Cache store mapping resource keys to bodies plus revalidation metadata.
///
/// Metadata lives in an in-process map; bodies live in the storage backend.
/// A body is written (atomically) before its metadata is published, so a
/// reader that sees metadata can read a complete body. Entries are never
/// evicted; staleness is a read-time classification and stale entries stay
/// around as fallback material for the process lifetime.
pub struct CacheStore {
    config: CacheConfig,
    storage: Arc<dyn StorageBackend>,
    meta: RwLock<HashMap<String, EntryMeta>>,
}

impl CacheStore {
    /// Create a new cache store
    pub fn new(storage: Arc<dyn StorageBackend>, config: CacheConfig) -> Self {
        info!("Initializing cache store (ttl: {}s)", config.ttl_secs);

        Self {
            config,
            storage,
            meta: RwLock::new(HashMap::new()),
        }
    }

    /// Look up an entry's metadata. Staleness is not checked here; even a
    /// stale entry's validators are used for conditional requests.
    pub fn lookup(&self, key: &str) -> Option<EntryMeta> {
        self.meta.read().get(key).cloned()
    }

    /// Read a full entry: metadata plus body.
    ///
    /// Metadata whose body has vanished from storage is dropped and treated
    /// as a miss, never surfaced as a partial entry.
    pub async fn get(&self, key: &str) -> Result<Option<(Bytes, EntryMeta)>, CoreError> {
        let entry = match self.lookup(key) {
            Some(e) => e,
            None => return Ok(None),
        };

        match self.storage.read(key).await {
            Ok(body) => Ok(Some((body, entry))),
            Err(StorageError::NotFound(_)) => {
                warn!("Cache metadata present but body missing for {}", key);
                self.meta.write().remove(key);
                Ok(None)
            }
            Err(e) => Err(CoreError::Storage(e)),
        }
    }

    /// Store a body and its metadata, replacing any previous entry.
    ///
    /// The body lands in storage first (temp-file-and-rename), metadata is
    /// published after, so concurrent readers observe either the old entry
    /// or the new one in full.
    pub async fn insert(&self, key: &str, entry: EntryMeta, body: Bytes) -> Result<(), CoreError> {
        debug!("Caching {} ({} bytes)", key, body.len());

        self.storage.write(key, body).await?;
        self.meta.write().insert(key.to_string(), entry);

        Ok(())
    }

    /// Slide an entry's freshness forward after a successful revalidation.
    pub fn touch(&self, key: &str, now: DateTime<Utc>) {
        if let Some(entry) = self.meta.write().get_mut(key) {
            entry.fetched_at = now;
        }
    }

    /// Whether an entry is fresh at `now`. Pure classification; freshness
    /// never triggers eviction.
    pub fn is_fresh(&self, entry: &EntryMeta, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.fetched_at);
        age < chrono::Duration::seconds(self.config.ttl_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pixgate_storage::{MemoryStorage, cache_key};

    fn store(ttl_secs: u64) -> CacheStore {
        CacheStore::new(Arc::new(MemoryStorage::new()), CacheConfig { ttl_secs })
    }

    fn meta_at(fetched_at: DateTime<Utc>) -> EntryMeta {
        EntryMeta {
            etag: Some("\"v1\"".to_string()),
            last_modified: None,
            content_type: Some("image/png".to_string()),
            cache_control: None,
            fetched_at,
        }
    }

    #[tokio::test]
    async fn test_insert_get_round_trip() {
        let store = store(300);
        let key = cache_key("abc.png");
        let body = Bytes::from_static(b"png bytes");

        store.insert(&key, meta_at(Utc::now()), body.clone()).await.unwrap();

        let (read_back, entry) = store.get(&key).await.unwrap().unwrap();
        assert_eq!(read_back, body);
        assert_eq!(entry.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_lookup_does_not_require_freshness() {
        let store = store(300);
        let key = cache_key("abc.png");
        let stale = Utc::now() - Duration::seconds(3600);

        store
            .insert(&key, meta_at(stale), Bytes::from_static(b"old"))
            .await
            .unwrap();

        let entry = store.lookup(&key).unwrap();
        assert!(!store.is_fresh(&entry, Utc::now()));
        assert_eq!(entry.revalidators().etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let store = store(300);
        let now = Utc::now();

        let entry = meta_at(now - Duration::seconds(299));
        assert!(store.is_fresh(&entry, now));

        let entry = meta_at(now - Duration::seconds(300));
        assert!(!store.is_fresh(&entry, now));
    }

    #[tokio::test]
    async fn test_touch_slides_freshness_forward() {
        let store = store(300);
        let key = cache_key("abc.png");
        let stale = Utc::now() - Duration::seconds(3600);

        store
            .insert(&key, meta_at(stale), Bytes::from_static(b"body"))
            .await
            .unwrap();

        let now = Utc::now();
        store.touch(&key, now);

        let entry = store.lookup(&key).unwrap();
        assert_eq!(entry.fetched_at, now);
        assert!(store.is_fresh(&entry, now));
    }

    #[tokio::test]
    async fn test_insert_replaces_previous_entry() {
        let store = store(300);
        let key = cache_key("abc.png");

        store
            .insert(&key, meta_at(Utc::now()), Bytes::from_static(b"v1"))
            .await
            .unwrap();

        let mut updated = meta_at(Utc::now());
        updated.etag = Some("\"v2\"".to_string());
        store
            .insert(&key, updated, Bytes::from_static(b"v2"))
            .await
            .unwrap();

        let (body, entry) = store.get(&key).await.unwrap().unwrap();
        assert_eq!(body, Bytes::from_static(b"v2"));
        assert_eq!(entry.etag.as_deref(), Some("\"v2\""));
    }

    #[tokio::test]
    async fn test_dangling_metadata_is_dropped() {
        let storage = Arc::new(MemoryStorage::new());
        let store = CacheStore::new(storage.clone(), CacheConfig::default());
        let key = cache_key("abc.png");

        store
            .insert(&key, meta_at(Utc::now()), Bytes::from_static(b"body"))
            .await
            .unwrap();
        storage.delete(&key).await.unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        // The dangling metadata was cleaned up as well
        assert!(store.lookup(&key).is_none());
    }
}
