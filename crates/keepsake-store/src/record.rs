use bytes::Bytes;
use chrono::{DateTime, Utc};
use keepsake_types::{MediaId, MediaKind};
use serde::{Deserialize, Serialize};

/// A binary payload handed to the store, before it has an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaBlob {
    pub bytes: Bytes,
    pub mime: String,
    pub original_name: String,
}

impl MediaBlob {
    pub fn new(bytes: impl Into<Bytes>, mime: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
            original_name: original_name.into(),
        }
    }

    /// Build a blob from a file name, guessing the MIME type from its extension.
    pub fn from_named(bytes: impl Into<Bytes>, original_name: impl Into<String>) -> Self {
        let original_name = original_name.into();
        let mime = MediaKind::guess_mime(&original_name);
        Self::new(bytes, mime, original_name)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }
}

/// Everything the store knows about a record except its payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMeta {
    pub id: MediaId,
    pub mime: String,
    /// Free-form bookkeeping tag, e.g. `timeline` or `standalone`.
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub original_name: String,
}

/// A stored record: metadata plus payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRecord {
    pub meta: MediaMeta,
    pub payload: Bytes,
}

impl MediaRecord {
    /// Create a record for `blob` under `id`, stamped now.
    pub fn new(id: MediaId, blob: &MediaBlob, category: &str) -> Self {
        Self {
            meta: MediaMeta {
                id,
                mime: blob.mime.clone(),
                category: category.to_string(),
                created_at: Utc::now(),
                size_bytes: blob.len() as u64,
                original_name: blob.original_name.clone(),
            },
            payload: blob.bytes.clone(),
        }
    }

    pub fn id(&self) -> &MediaId {
        &self.meta.id
    }

    /// Reconstruct the blob this record was created from.
    pub fn to_blob(&self) -> MediaBlob {
        MediaBlob::new(
            self.payload.clone(),
            self.meta.mime.clone(),
            self.meta.original_name.clone(),
        )
    }
}

/// Aggregate usage over all records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreUsage {
    pub used_bytes: u64,
    pub count: usize,
}

impl StoreUsage {
    pub(crate) fn add(&mut self, size_bytes: u64) {
        self.used_bytes += size_bytes;
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_copies_blob_metadata() {
        let blob = MediaBlob::from_named(vec![1u8, 2, 3], "beach.png");
        let record = MediaRecord::new(MediaId::generate(), &blob, "timeline");
        assert_eq!(record.meta.size_bytes, 3);
        assert_eq!(record.meta.mime, "image/png");
        assert_eq!(record.meta.category, "timeline");
        assert_eq!(record.meta.original_name, "beach.png");
        assert_eq!(record.to_blob(), blob);
    }

    #[test]
    fn blob_kind_follows_mime() {
        let blob = MediaBlob::from_named(vec![0u8], "clip.mp4");
        assert_eq!(blob.kind(), MediaKind::Video);
        assert!(!blob.is_empty());
    }
}
