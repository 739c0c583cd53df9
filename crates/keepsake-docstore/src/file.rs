//! A document store persisted as one JSON file.
//!
//! The file is a JSON object mapping each key to its stored JSON text. Every
//! successful write rewrites the whole file through a temporary file in the
//! same directory followed by a rename, so a crash mid-write leaves the
//! previous file intact.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{DocStoreError, DocStoreResult};
use crate::memory::{poisoned, EntryMap};
use crate::traits::DocumentStore;
use crate::usage::{DocStoreUsage, DEFAULT_CAPACITY};

/// File-backed implementation of [`DocumentStore`].
#[derive(Debug)]
pub struct JsonFileDocumentStore {
    path: PathBuf,
    map: RwLock<EntryMap>,
    capacity: u64,
}

impl JsonFileDocumentStore {
    /// Open the store at `path` with the default 5 MiB ceiling.
    pub fn open(path: impl Into<PathBuf>) -> DocStoreResult<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// one is ignored with a warning and replaced on the next write.
    pub fn open_with_capacity(path: impl Into<PathBuf>, capacity: u64) -> DocStoreResult<Self> {
        let path = path.into();
        let mut map = EntryMap::default();
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => map.entries = entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "ignoring corrupt document store: {}", e)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(path = %path.display(), keys = map.entries.len(), "opened document store");
        Ok(Self {
            path,
            map: RwLock::new(map),
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, map: &EntryMap) -> DocStoreResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(&map.entries)
            .map_err(|e| DocStoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| DocStoreError::Io(e.error))?;
        Ok(())
    }
}

impl DocumentStore for JsonFileDocumentStore {
    fn save_raw(&self, key: &str, value: &str) -> DocStoreResult<()> {
        let mut map = self.map.write().map_err(poisoned)?;
        let mut next = map.clone();
        next.insert_checked(key, value, self.capacity)?;
        self.flush(&next)?;
        *map = next;
        Ok(())
    }

    fn save_batch_raw(&self, entries: &[(&str, String)]) -> DocStoreResult<()> {
        let mut map = self.map.write().map_err(poisoned)?;
        let mut next = map.clone();
        next.insert_batch_checked(entries, self.capacity)?;
        self.flush(&next)?;
        *map = next;
        Ok(())
    }

    fn load_raw(&self, key: &str) -> DocStoreResult<Option<String>> {
        let map = self.map.read().map_err(poisoned)?;
        Ok(map.entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> DocStoreResult<bool> {
        let mut map = self.map.write().map_err(poisoned)?;
        if !map.entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = map.clone();
        next.entries.remove(key);
        self.flush(&next)?;
        *map = next;
        Ok(true)
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
