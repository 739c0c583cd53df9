use async_trait::async_trait;
use keepsake_types::MediaId;

use crate::error::StoreResult;
use crate::record::{MediaBlob, MediaMeta, MediaRecord, StoreUsage};

/// Id-addressed store for binary media payloads.
///
/// All implementations must satisfy these invariants:
/// - `put` generates the id; two `put` calls never return the same id.
/// - `get` of a missing id fails with `StoreError::NotFound`.
/// - `delete` is idempotent.
/// - When `is_available` is `false`, every other operation fails with
///   `StoreError::Unavailable` and leaves no partial state behind.
#[async_trait]
pub trait BinaryObjectStore: Send + Sync {
    /// Capability probe. Callers check this before relying on durability.
    async fn is_available(&self) -> bool;

    /// Persist `blob` tagged with `category` and return its new id.
    async fn put(&self, blob: &MediaBlob, category: &str) -> StoreResult<MediaId>;

    /// Read a record by id.
    async fn get(&self, id: &MediaId) -> StoreResult<MediaRecord>;

    /// Read only the metadata of a record. `Ok(None)` if absent.
    async fn head(&self, id: &MediaId) -> StoreResult<Option<MediaMeta>>;

    /// Delete a record. Returns `true` if it existed.
    async fn delete(&self, id: &MediaId) -> StoreResult<bool>;

    /// Aggregate byte and record counts over the whole store.
    async fn usage(&self) -> StoreResult<StoreUsage>;

    /// Remove every record and return how many were removed.
    async fn clear(&self) -> StoreResult<usize>;

    /// Check whether a record exists.
    async fn exists(&self, id: &MediaId) -> StoreResult<bool> {
        Ok(self.head(id).await?.is_some())
    }
}
