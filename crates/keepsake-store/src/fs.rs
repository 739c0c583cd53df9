//! Directory-backed binary store.
//!
//! Each record is one file `<id>.rec`:
//!
//! ```text
//! magic "KSMR" | version u32 | meta_len u32 | meta (bincode) | crc32 u32 | payload
//! ```
//!
//! The header and metadata come first so `head`/`usage` can stop reading
//! before the payload. The CRC covers the payload only.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use keepsake_types::MediaId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{StoreError, StoreResult};
use crate::record::{MediaBlob, MediaMeta, MediaRecord, StoreUsage};
use crate::traits::BinaryObjectStore;

const MAGIC: &[u8; 4] = b"KSMR";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;
const EXTENSION: &str = "rec";
const MAX_ID_ATTEMPTS: usize = 16;

/// Binary store persisting one record file per object under a directory.
#[derive(Debug, Clone)]
pub struct FsBinaryStore {
    root: PathBuf,
}

impl FsBinaryStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "opened media store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &MediaId) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", id.as_str()))
    }

    fn encode(record: &MediaRecord) -> StoreResult<Vec<u8>> {
        let meta = bincode::serialize(&record.meta)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(HEADER_LEN + meta.len() + 4 + record.payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&(meta.len() as u32).to_be_bytes());
        out.extend_from_slice(&meta);
        out.extend_from_slice(&crc32fast::hash(&record.payload).to_be_bytes());
        out.extend_from_slice(&record.payload);
        Ok(out)
    }

    fn check_header(id: &MediaId, header: &[u8]) -> StoreResult<usize> {
        if header.len() < HEADER_LEN || &header[0..4] != MAGIC {
            return Err(StoreError::CorruptRecord {
                id: id.clone(),
                reason: "bad magic".into(),
            });
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != VERSION {
            return Err(StoreError::CorruptRecord {
                id: id.clone(),
                reason: format!("unsupported record version {version}"),
            });
        }
        Ok(u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize)
    }

    fn decode_meta(id: &MediaId, raw: &[u8]) -> StoreResult<MediaMeta> {
        bincode::deserialize(raw).map_err(|e| StoreError::CorruptRecord {
            id: id.clone(),
            reason: format!("metadata: {e}"),
        })
    }

    fn decode(id: &MediaId, data: Vec<u8>) -> StoreResult<MediaRecord> {
        let meta_len = Self::check_header(id, &data)?;
        let meta_end = HEADER_LEN + meta_len;
        if data.len() < meta_end + 4 {
            return Err(StoreError::CorruptRecord {
                id: id.clone(),
                reason: "truncated record".into(),
            });
        }
        let meta = Self::decode_meta(id, &data[HEADER_LEN..meta_end])?;
        let crc_bytes = &data[meta_end..meta_end + 4];
        let expected = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let payload = Bytes::from(data).slice(meta_end + 4..);
        let computed = crc32fast::hash(&payload);
        if computed != expected {
            return Err(StoreError::ChecksumMismatch {
                id: id.clone(),
                expected,
                computed,
            });
        }
        Ok(MediaRecord { meta, payload })
    }

    async fn read_meta(&self, id: &MediaId) -> StoreResult<Option<MediaMeta>> {
        let mut file = match tokio::fs::File::open(self.path_for(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header).await?;
        let meta_len = Self::check_header(id, &header)?;
        let mut meta = vec![0u8; meta_len];
        file.read_exact(&mut meta).await?;
        Self::decode_meta(id, &meta).map(Some)
    }

    async fn record_ids(&self) -> StoreResult<Vec<MediaId>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == EXTENSION).unwrap_or(false) {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                match MediaId::parse(stem) {
                    Ok(id) => ids.push(id),
                    Err(e) => tracing::warn!("skipping unrecognised record {:?}: {}", path, e),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl BinaryObjectStore for FsBinaryStore {
    async fn is_available(&self) -> bool {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        }
    }

    async fn put(&self, blob: &MediaBlob, category: &str) -> StoreResult<MediaId> {
        if !self.is_available().await {
            return Err(StoreError::Unavailable(format!(
                "{} is not a writable directory",
                self.root.display()
            )));
        }
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = MediaId::generate();
            let record = MediaRecord::new(id.clone(), blob, category);
            let encoded = Self::encode(&record)?;
            let path = self.path_for(&id);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            let written = async {
                file.write_all(&encoded).await?;
                file.sync_all().await
            };
            if let Err(e) = written.await {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }
            tracing::debug!(%id, size = blob.len(), category, "stored media record");
            return Ok(id);
        }
        Err(StoreError::IdCollision(MAX_ID_ATTEMPTS))
    }

    async fn get(&self, id: &MediaId) -> StoreResult<MediaRecord> {
        let data = match tokio::fs::read(self.path_for(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Self::decode(id, data)
    }

    async fn head(&self, id: &MediaId) -> StoreResult<Option<MediaMeta>> {
        self.read_meta(id).await
    }

    async fn delete(&self, id: &MediaId) -> StoreResult<bool> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn usage(&self) -> StoreResult<StoreUsage> {
        let mut usage = StoreUsage::default();
        for id in self.record_ids().await? {
            match self.read_meta(&id).await {
                Ok(Some(meta)) => usage.add(meta.size_bytes),
                Ok(None) => {}
                Err(e) => tracing::warn!(%id, "skipping unreadable record: {}", e),
            }
        }
        Ok(usage)
    }

    async fn clear(&self) -> StoreResult<usize> {
        let ids = self.record_ids().await?;
        let mut removed = 0;
        for id in &ids {
            if self.delete(id).await? {
                removed += 1;
            }
        }
        tracing::info!(removed, root = %self.root.display(), "cleared media store");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(content: &[u8]) -> MediaBlob {
        MediaBlob::from_named(content.to_vec(), "photo.png")
    }

    #[tokio::test]
    async fn put_get_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        let id = store.put(&blob(b"disk payload"), "timeline").await.unwrap();
        assert!(dir.path().join(format!("{id}.rec")).exists());

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.payload.as_ref(), b"disk payload");
        assert_eq!(record.meta.original_name, "photo.png");
    }

    #[tokio::test]
    async fn every_record_file_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        for i in 0..8u8 {
            store.put(&blob(&vec![i; 64 + i as usize]), "timeline").await.unwrap();
        }

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut files = 0;
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let path = entry.path();
            assert_eq!(path.extension().unwrap(), EXTENSION);
            let stem = path.file_stem().unwrap().to_str().unwrap();
            let id = MediaId::parse(stem).unwrap();
            let data = tokio::fs::read(&path).await.unwrap();
            assert!(data.len() > HEADER_LEN);
            FsBinaryStore::decode(&id, data).unwrap();
            files += 1;
        }
        assert_eq!(files, 8);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FsBinaryStore::open(dir.path()).await.unwrap();
            store.put(&blob(b"persisted"), "standalone").await.unwrap()
        };
        let reopened = FsBinaryStore::open(dir.path()).await.unwrap();
        let record = reopened.get(&id).await.unwrap();
        assert_eq!(record.payload.as_ref(), b"persisted");
        assert_eq!(record.meta.category, "standalone");
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        let id = MediaId::parse("img_0_gone").unwrap();
        assert!(matches!(store.get(&id).await, Err(StoreError::NotFound(_))));
        assert!(store.head(&id).await.unwrap().is_none());
        assert!(!store.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn corrupted_payload_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        let id = store.put(&blob(b"original bytes"), "timeline").await.unwrap();

        let path = dir.path().join(format!("{id}.rec"));
        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, raw).unwrap();

        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        let id = MediaId::parse("img_1_garbage").unwrap();
        std::fs::write(dir.path().join("img_1_garbage.rec"), b"not a record at all").unwrap();
        assert!(matches!(
            store.get(&id).await,
            Err(StoreError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn usage_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        store.put(&blob(b"1234"), "timeline").await.unwrap();
        store.put(&blob(b"123456"), "timeline").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let usage = store.usage().await.unwrap();
        assert_eq!(usage, StoreUsage { used_bytes: 10, count: 2 });

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.usage().await.unwrap().count, 0);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn missing_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBinaryStore::open(dir.path().join("media")).await.unwrap();
        assert!(store.is_available().await);
        std::fs::remove_dir_all(dir.path().join("media")).unwrap();
        assert!(!store.is_available().await);
        assert!(matches!(
            store.put(&blob(b"x"), "timeline").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
