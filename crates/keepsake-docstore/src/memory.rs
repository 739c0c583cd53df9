//! In-memory document store for testing and ephemeral use.
//!
//! [`InMemoryDocumentStore`] keeps all entries in a `BTreeMap` protected by
//! a `RwLock`. The capacity check is shared with the file-backed store
//! through [`EntryMap`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{DocStoreError, DocStoreResult};
use crate::traits::DocumentStore;
use crate::usage::{entry_cost, DocStoreUsage, DEFAULT_CAPACITY};

/// Entries plus the capacity they are checked against.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntryMap {
    pub(crate) entries: BTreeMap<String, String>,
}

impl EntryMap {
    pub(crate) fn used_bytes(&self) -> u64 {
        self.entries.iter().map(|(k, v)| entry_cost(k, v)).sum()
    }

    /// Insert after checking that the result fits in `capacity`.
    pub(crate) fn insert_checked(
        &mut self,
        key: &str,
        value: &str,
        capacity: u64,
    ) -> DocStoreResult<Option<String>> {
        let current = self.used_bytes();
        let replaced = self.entries.get(key).map(|old| entry_cost(key, old)).unwrap_or(0);
        let needed = current - replaced + entry_cost(key, value);
        if needed > capacity {
            tracing::warn!(key, needed, capacity, "document store quota exceeded");
            return Err(DocStoreError::QuotaExceeded {
                key: key.to_string(),
                needed,
                capacity,
            });
        }
        Ok(self.entries.insert(key.to_string(), value.to_string()))
    }

    /// Insert every entry, or none of them if the combined result would not
    /// fit in `capacity`.
    pub(crate) fn insert_batch_checked(
        &mut self,
        entries: &[(&str, String)],
        capacity: u64,
    ) -> DocStoreResult<()> {
        let mut next = self.clone();
        for (key, value) in entries {
            next.entries.insert(key.to_string(), value.clone());
        }
        let needed = next.used_bytes();
        if needed > capacity {
            let key = batch_label(entries);
            tracing::warn!(%key, needed, capacity, "document store quota exceeded");
            return Err(DocStoreError::QuotaExceeded {
                key,
                needed,
                capacity,
            });
        }
        *self = next;
        Ok(())
    }
}

pub(crate) fn batch_label(entries: &[(&str, String)]) -> String {
    entries.iter().map(|(key, _)| *key).collect::<Vec<_>>().join("+")
}

pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> DocStoreError {
    DocStoreError::LockPoisoned(e.to_string())
}

/// An in-memory implementation of [`DocumentStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    map: RwLock<EntryMap>,
    capacity: u64,
}

impl InMemoryDocumentStore {
    /// Create an empty store with the default 5 MiB ceiling.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            map: RwLock::new(EntryMap::default()),
            capacity,
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn save_raw(&self, key: &str, value: &str) -> DocStoreResult<()> {
        let mut map = self.map.write().map_err(poisoned)?;
        map.insert_checked(key, value, self.capacity)?;
        Ok(())
    }

    fn save_batch_raw(&self, entries: &[(&str, String)]) -> DocStoreResult<()> {
        let mut map = self.map.write().map_err(poisoned)?;
        map.insert_batch_checked(entries, self.capacity)
    }

    fn load_raw(&self, key: &str) -> DocStoreResult<Option<String>> {
        let map = self.map.read().map_err(poisoned)?;
        Ok(map.entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> DocStoreResult<bool> {
        let mut map = self.map.write().map_err(poisoned)?;
        Ok(map.entries.remove(key).is_some())
    }

    fn keys(&self) -> DocStoreResult<Vec<String>> {
        let map = self.map.read().map_err(poisoned)?;
        Ok(map.entries.keys().cloned().collect())
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn usage(&self) -> DocStoreResult<DocStoreUsage> {
        let map = self.map.read().map_err(poisoned)?;
        Ok(DocStoreUsage::new(map.used_bytes(), self.capacity))
    }
}
