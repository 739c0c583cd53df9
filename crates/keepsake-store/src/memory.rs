use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use keepsake_types::MediaId;

use crate::error::{StoreError, StoreResult};
use crate::record::{MediaBlob, MediaMeta, MediaRecord, StoreUsage};
use crate::traits::BinaryObjectStore;

const MAX_ID_ATTEMPTS: usize = 16;

/// In-memory, HashMap-based binary store.
///
/// Intended for tests and embedding. Records are held behind a `RwLock`;
/// payloads are reference-counted so reads do not copy bytes. The store can
/// be flipped to unavailable to simulate a blocked backend.
pub struct InMemoryBinaryStore {
    records: RwLock<HashMap<MediaId, MediaRecord>>,
    available: AtomicBool,
}

impl InMemoryBinaryStore {
    /// Create a new empty, available store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Create a store that reports itself unavailable.
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store disabled".into()))
        }
    }
}

impl Default for InMemoryBinaryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

#[async_trait]
impl BinaryObjectStore for InMemoryBinaryStore {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn put(&self, blob: &MediaBlob, category: &str) -> StoreResult<MediaId> {
        self.check_available()?;
        let mut map = self.records.write().map_err(poisoned)?;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = MediaId::generate();
            if map.contains_key(&id) {
                continue;
            }
            map.insert(id.clone(), MediaRecord::new(id.clone(), blob, category));
            tracing::debug!(%id, size = blob.len(), category, "stored media");
            return Ok(id);
        }
        Err(StoreError::IdCollision(MAX_ID_ATTEMPTS))
    }

    async fn get(&self, id: &MediaId) -> StoreResult<MediaRecord> {
        self.check_available()?;
        let map = self.records.read().map_err(poisoned)?;
        map.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn head(&self, id: &MediaId) -> StoreResult<Option<MediaMeta>> {
        self.check_available()?;
        let map = self.records.read().map_err(poisoned)?;
        Ok(map.get(id).map(|record| record.meta.clone()))
    }

    async fn delete(&self, id: &MediaId) -> StoreResult<bool> {
        self.check_available()?;
        let mut map = self.records.write().map_err(poisoned)?;
        Ok(map.remove(id).is_some())
    }

    async fn usage(&self) -> StoreResult<StoreUsage> {
        self.check_available()?;
        let map = self.records.read().map_err(poisoned)?;
        let mut usage = StoreUsage::default();
        for record in map.values() {
            usage.add(record.meta.size_bytes);
        }
        Ok(usage)
    }

    async fn clear(&self) -> StoreResult<usize> {
        self.check_available()?;
        let mut map = self.records.write().map_err(poisoned)?;
        let removed = map.len();
        map.clear();
        tracing::info!(removed, "cleared in-memory media store");
        Ok(removed)
    }
}

impl std::fmt::Debug for InMemoryBinaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBinaryStore")
            .field("record_count", &self.len())
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn blob(content: &[u8]) -> MediaBlob {
        MediaBlob::from_named(content.to_vec(), "photo.jpg")
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryBinaryStore::new();
        let id = store.put(&blob(b"hello"), "timeline").await.unwrap();
        let record = store.get(&id).await.unwrap();
        assert_eq!(record.payload.as_ref(), b"hello");
        assert_eq!(record.meta.category, "timeline");
        assert_eq!(record.meta.size_bytes, 5);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryBinaryStore::new();
        let id = MediaId::parse("img_0_missing").unwrap();
        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn identical_payloads_get_distinct_ids() {
        let store = InMemoryBinaryStore::new();
        let a = store.put(&blob(b"same"), "timeline").await.unwrap();
        let b = store.put(&blob(b"same"), "timeline").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryBinaryStore::new();
        let id = store.put(&blob(b"x"), "standalone").await.unwrap();
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(!store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn head_returns_metadata_only() {
        let store = InMemoryBinaryStore::new();
        let id = store.put(&blob(b"12345678"), "timeline").await.unwrap();
        let meta = store.head(&id).await.unwrap().unwrap();
        assert_eq!(meta.size_bytes, 8);
        assert_eq!(meta.mime, "image/jpeg");
        let missing = MediaId::parse("img_0_none").unwrap();
        assert!(store.head(&missing).await.unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Usage / clear
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn usage_sums_sizes() {
        let store = InMemoryBinaryStore::new();
        store.put(&blob(b"12345"), "timeline").await.unwrap();
        store.put(&blob(b"123456789"), "standalone").await.unwrap();
        let usage = store.usage().await.unwrap();
        assert_eq!(usage.used_bytes, 14);
        assert_eq!(usage.count, 2);
    }

    #[tokio::test]
    async fn clear_removes_all() {
        let store = InMemoryBinaryStore::new();
        store.put(&blob(b"a"), "timeline").await.unwrap();
        store.put(&blob(b"b"), "timeline").await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Availability
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unavailable_store_rejects_writes() {
        let store = InMemoryBinaryStore::unavailable();
        assert!(!store.is_available().await);
        let err = store.put(&blob(b"x"), "timeline").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn availability_can_be_restored() {
        let store = InMemoryBinaryStore::unavailable();
        store.set_available(true);
        assert!(store.put(&blob(b"x"), "timeline").await.is_ok());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_never_collide() {
        let store = Arc::new(InMemoryBinaryStore::new());
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .put(&blob(format!("payload-{i}").as_bytes()), "timeline")
                        .await
                        .unwrap()
                })
            })
            .collect();
        let ids: HashSet<MediaId> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();
        assert_eq!(ids.len(), 64);
        assert_eq!(store.len(), 64);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBinaryStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBinaryStore"));
        assert!(debug.contains("record_count"));
    }
}
