//! The [`DocumentStore`] trait and its typed helpers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DocStoreError, DocStoreResult};
use crate::keys::StoreKey;
use crate::memory::batch_label;
use crate::usage::{entry_cost, DocStoreUsage};

/// Synchronous key to JSON-text storage with a fixed byte ceiling.
///
/// Implementations must be thread-safe and must leave the previous value in
/// place when a write is rejected for exceeding capacity.
pub trait DocumentStore: Send + Sync {
    /// Store raw JSON text under `key`, replacing any previous value.
    ///
    /// Fails with [`DocStoreError::QuotaExceeded`] if the store would exceed
    /// its capacity after the write.
    fn save_raw(&self, key: &str, value: &str) -> DocStoreResult<()>;

    /// Store several entries together: either all of them land or, when the
    /// combined result would exceed capacity, none do.
    ///
    /// The default checks the projected total first and then writes each
    /// entry in turn; stores holding a single lock override it.
    fn save_batch_raw(&self, entries: &[(&str, String)]) -> DocStoreResult<()> {
        let mut projected: BTreeMap<&str, u64> = BTreeMap::new();
        for (key, value) in entries {
            projected.insert(*key, entry_cost(key, value));
        }
        let mut needed = self.usage()?.used_bytes;
        for (key, cost) in &projected {
            let old = self.load_raw(key)?.map(|old| entry_cost(key, &old)).unwrap_or(0);
            needed = needed.saturating_sub(old) + cost;
        }
        let capacity = self.capacity();
        if needed > capacity {
            return Err(DocStoreError::QuotaExceeded {
                key: batch_label(entries),
                needed,
                capacity,
            });
        }
        for (key, value) in entries {
            self.save_raw(key, value)?;
        }
        Ok(())
    }

    /// Read raw text under `key`. `Ok(None)` if absent.
    fn load_raw(&self, key: &str) -> DocStoreResult<Option<String>>;

    /// Delete `key`. Returns `true` if it existed.
    fn remove(&self, key: &str) -> DocStoreResult<bool>;

    /// All keys currently stored, sorted.
    fn keys(&self) -> DocStoreResult<Vec<String>>;

    /// Byte ceiling of the store.
    fn capacity(&self) -> u64;

    /// Current usage against [`DocumentStore::capacity`].
    fn usage(&self) -> DocStoreResult<DocStoreUsage>;

    /// Remove the core document keys (see [`StoreKey::CORE`]). Returns how
    /// many keys existed.
    fn clear_all(&self) -> DocStoreResult<usize> {
        let mut removed = 0;
        for key in StoreKey::CORE {
            if self.remove(key.as_str())? {
                removed += 1;
            }
        }
        tracing::info!(removed, "cleared document store");
        Ok(removed)
    }
}

/// Typed access on top of [`DocumentStore`].
pub trait DocumentStoreExt: DocumentStore {
    /// Serialize `value` as JSON and store it under `key`.
    fn save<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> DocStoreResult<()> {
        let json =
            serde_json::to_string(value).map_err(|e| DocStoreError::Serialization(e.to_string()))?;
        self.save_raw(key.as_str(), &json)
    }

    /// Load and parse the value under `key`.
    ///
    /// Missing keys, unreadable storage and values that fail to parse all
    /// come back as `None`.
    fn load<T: DeserializeOwned>(&self, key: StoreKey) -> Option<T> {
        let raw = match self.load_raw(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, "failed to read stored value: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%key, "ignoring unparsable stored value: {}", e);
                None
            }
        }
    }

    /// Like [`DocumentStoreExt::load`], but returns the untyped JSON value.
    fn load_value(&self, key: StoreKey) -> Option<serde_json::Value> {
        self.load(key)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
