use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use keepsake_store::{BinaryObjectStore, MediaBlob, StoreError};
use keepsake_types::{estimate_decoded_len, DataUrl, MediaRef, SessionId, TransientHandle};

use crate::error::{ResolveError, ResolveResult};
use crate::resolved::ResolvedMedia;
use crate::source::MediaSource;

/// Outcome of [`ReferenceResolver::persist_media`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Persisted {
    pub media: MediaRef,
    /// Set when the store could not take the blob and the reference is only
    /// valid for this session.
    pub degraded: Option<String>,
}

impl Persisted {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Routes media reads and writes to the right tier.
///
/// Transient references are scoped to this resolver's [`SessionId`]: a new
/// resolver over the same store (a reload) cannot see the previous one's
/// transient blobs.
pub struct ReferenceResolver {
    store: Arc<dyn BinaryObjectStore>,
    session: SessionId,
    transient: RwLock<HashMap<u64, MediaBlob>>,
    next_seq: AtomicU64,
    asset_root: Option<PathBuf>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> ResolveError {
    ResolveError::LockPoisoned(e.to_string())
}

impl ReferenceResolver {
    /// A resolver for a fresh session over `store`.
    pub fn new(store: Arc<dyn BinaryObjectStore>) -> Self {
        Self {
            store,
            session: SessionId::new(),
            transient: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            asset_root: None,
        }
    }

    /// Allow bundled asset paths to be read from `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn store(&self) -> &Arc<dyn BinaryObjectStore> {
        &self.store
    }

    /// Number of live transient blobs in this session.
    pub fn transient_count(&self) -> usize {
        self.transient.read().map(|map| map.len()).unwrap_or(0)
    }

    /// `true` if `handle` belongs to this session and has not been released.
    pub fn is_live(&self, handle: &TransientHandle) -> bool {
        handle.session == self.session
            && self
                .transient
                .read()
                .map(|map| map.contains_key(&handle.seq))
                .unwrap_or(false)
    }

    fn hold_transient(&self, blob: &MediaBlob) -> ResolveResult<TransientHandle> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.transient
            .write()
            .map_err(poisoned)?
            .insert(seq, blob.clone());
        Ok(TransientHandle::new(self.session, seq))
    }

    fn transient_blob(&self, handle: &TransientHandle) -> ResolveResult<MediaBlob> {
        if handle.session != self.session {
            return Err(ResolveError::StaleReference(*handle));
        }
        self.transient
            .read()
            .map_err(poisoned)?
            .get(&handle.seq)
            .cloned()
            .ok_or(ResolveError::StaleReference(*handle))
    }

    /// Store `blob` durably if possible, otherwise hold it for this session.
    ///
    /// Never fails outright: store problems become a transient reference
    /// plus a degradation message for the user.
    pub async fn persist_media(&self, blob: &MediaBlob, category: &str) -> ResolveResult<Persisted> {
        let reason = if self.store.is_available().await {
            match self.store.put(blob, category).await {
                Ok(id) => {
                    tracing::debug!(%id, category, "persisted media");
                    return Ok(Persisted {
                        media: MediaRef::Stored(id),
                        degraded: None,
                    });
                }
                Err(e) => e.to_string(),
            }
        } else {
            StoreError::Unavailable("not supported in this environment".into()).to_string()
        };
        let handle = self.hold_transient(blob)?;
        tracing::warn!(%handle, category, "media kept for this session only: {}", reason);
        Ok(Persisted {
            media: MediaRef::Transient(handle),
            degraded: Some(reason),
        })
    }

    /// Move a live transient blob into the binary store.
    ///
    /// Returns the durable reference, or `None` if `media` is not transient,
    /// is already stale, or the store still refuses it.
    pub async fn upgrade_transient(&self, media: &MediaRef, category: &str) -> Option<MediaRef> {
        let MediaRef::Transient(handle) = media else {
            return None;
        };
        let blob = self.transient_blob(handle).ok()?;
        if !self.store.is_available().await {
            return None;
        }
        match self.store.put(&blob, category).await {
            Ok(id) => {
                if let Ok(mut map) = self.transient.write() {
                    map.remove(&handle.seq);
                }
                tracing::info!(%handle, %id, "upgraded transient media");
                Some(MediaRef::Stored(id))
            }
            Err(e) => {
                tracing::warn!(%handle, "transient media still not persistable: {}", e);
                None
            }
        }
    }

    /// Free whatever backs `media`. Inline literals are left alone.
    pub async fn release(&self, media: &MediaRef) -> ResolveResult<()> {
        match media {
            MediaRef::Stored(id) => {
                let existed = self.store.delete(id).await?;
                tracing::debug!(%id, existed, "released stored media");
            }
            MediaRef::Transient(handle) => {
                if handle.session == self.session {
                    self.transient.write().map_err(poisoned)?.remove(&handle.seq);
                }
            }
            MediaRef::Inline(_) => {}
        }
        Ok(())
    }

    fn asset_path(&self, path: &str) -> ResolveResult<PathBuf> {
        let unavailable = |reason: &str| ResolveError::AssetUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        let root = self
            .asset_root
            .as_ref()
            .ok_or_else(|| unavailable("no asset root configured"))?;
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(unavailable("path leaves the asset root"));
        }
        Ok(root.join(relative))
    }
}

impl std::fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("session", &self.session)
            .field("transient_count", &self.transient_count())
            .field("asset_root", &self.asset_root)
            .finish()
    }
}

#[async_trait]
impl MediaSource for ReferenceResolver {
    async fn resolve(&self, media: &MediaRef) -> ResolveResult<ResolvedMedia> {
        match media {
            MediaRef::Inline(literal) => Ok(ResolvedMedia::Literal(literal.clone())),
            MediaRef::Transient(handle) => self.transient_blob(handle).map(ResolvedMedia::Bytes),
            MediaRef::Stored(id) => {
                let record = self.store.get(id).await?;
                Ok(ResolvedMedia::Bytes(record.to_blob()))
            }
        }
    }

    async fn estimate_size(&self, media: &MediaRef) -> u64 {
        match media {
            MediaRef::Stored(id) => match self.store.head(id).await {
                Ok(Some(meta)) => meta.size_bytes,
                Ok(None) => 0,
                Err(e) => {
                    tracing::warn!(%id, "size lookup failed: {}", e);
                    0
                }
            },
            MediaRef::Transient(handle) => self
                .transient_blob(handle)
                .map(|blob| blob.len() as u64)
                .unwrap_or(0),
            MediaRef::Inline(literal) if literal.starts_with("data:") => {
                estimate_decoded_len(literal.len())
            }
            MediaRef::Inline(path) => match self.asset_path(path) {
                Ok(full) => tokio::fs::metadata(&full).await.map(|m| m.len()).unwrap_or(0),
                Err(_) => 0,
            },
        }
    }

    async fn load_asset(&self, path: &str) -> ResolveResult<MediaBlob> {
        if path.starts_with("data:") {
            let parsed = DataUrl::parse(path).map_err(|e| ResolveError::AssetUnavailable {
                path: "data: literal".to_string(),
                reason: e.to_string(),
            })?;
            return Ok(MediaBlob::new(parsed.bytes, parsed.mime, ""));
        }
        let full = self.asset_path(path)?;
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| ResolveError::AssetUnavailable {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(MediaBlob::from_named(bytes, name))
    }

    fn has_assets(&self) -> bool {
        self.asset_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use keepsake_store::{FsBinaryStore, InMemoryBinaryStore};
    use proptest::prelude::*;

    use super::*;

    fn blob(content: &[u8]) -> MediaBlob {
        MediaBlob::from_named(content.to_vec(), "photo.png")
    }

    fn resolver_over(store: InMemoryBinaryStore) -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(store))
    }

    async fn bytes_of(resolver: &ReferenceResolver, media: &MediaRef) -> Vec<u8> {
        match resolver.resolve(media).await.unwrap() {
            ResolvedMedia::Bytes(blob) => blob.bytes.to_vec(),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn persist_then_resolve_roundtrip() {
        let resolver = resolver_over(InMemoryBinaryStore::new());
        let persisted = resolver.persist_media(&blob(b"pixels"), "timeline").await.unwrap();
        assert!(!persisted.is_degraded());
        assert!(matches!(persisted.media, MediaRef::Stored(_)));
        assert_eq!(bytes_of(&resolver, &persisted.media).await, b"pixels");
    }

    #[tokio::test]
    async fn unavailable_store_falls_back_to_transient() {
        let resolver = resolver_over(InMemoryBinaryStore::unavailable());
        let persisted = resolver.persist_media(&blob(b"preview"), "timeline").await.unwrap();
        assert!(persisted.is_degraded());
        assert!(persisted.media.is_transient());
        assert_eq!(bytes_of(&resolver, &persisted.media).await, b"preview");
    }

    #[tokio::test]
    async fn transient_is_stale_in_a_new_session() {
        let store: Arc<dyn BinaryObjectStore> = Arc::new(InMemoryBinaryStore::unavailable());
        let first = ReferenceResolver::new(Arc::clone(&store));
        let media = first.persist_media(&blob(b"x"), "timeline").await.unwrap().media;

        let reloaded = ReferenceResolver::new(store);
        let err = reloaded.resolve(&media).await.unwrap_err();
        assert!(matches!(err, ResolveError::StaleReference(_)));
        assert_eq!(reloaded.estimate_size(&media).await, 0);
    }

    #[tokio::test]
    async fn missing_stored_media_is_not_found() {
        let resolver = resolver_over(InMemoryBinaryStore::new());
        let media = resolver.persist_media(&blob(b"gone"), "timeline").await.unwrap().media;
        resolver.release(&media).await.unwrap();
        let err = resolver.resolve(&media).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        // Releasing twice is harmless.
        resolver.release(&media).await.unwrap();
    }

    #[tokio::test]
    async fn release_drops_transient_handle() {
        let resolver = resolver_over(InMemoryBinaryStore::unavailable());
        let media = resolver.persist_media(&blob(b"x"), "timeline").await.unwrap().media;
        assert_eq!(resolver.transient_count(), 1);
        resolver.release(&media).await.unwrap();
        assert_eq!(resolver.transient_count(), 0);
        assert!(resolver.resolve(&media).await.is_err());
    }

    #[tokio::test]
    async fn inline_resolves_without_touching_store() {
        let resolver = resolver_over(InMemoryBinaryStore::unavailable());
        let media = MediaRef::Inline("data:image/png;base64,AAAA".into());
        assert_eq!(
            resolver.resolve(&media).await.unwrap(),
            ResolvedMedia::Literal("data:image/png;base64,AAAA".into())
        );
        assert_eq!(
            resolver.estimate_size(&media).await,
            estimate_decoded_len("data:image/png;base64,AAAA".len())
        );
        resolver.release(&media).await.unwrap();
    }

    #[tokio::test]
    async fn upgrade_moves_transient_into_store() {
        let store = Arc::new(InMemoryBinaryStore::unavailable());
        let resolver = ReferenceResolver::new(store.clone());
        let media = resolver.persist_media(&blob(b"later"), "standalone").await.unwrap().media;

        assert!(resolver.upgrade_transient(&media, "standalone").await.is_none());
        store.set_available(true);
        let upgraded = resolver.upgrade_transient(&media, "standalone").await.unwrap();
        assert!(matches!(upgraded, MediaRef::Stored(_)));
        assert_eq!(resolver.transient_count(), 0);
        assert_eq!(bytes_of(&resolver, &upgraded).await, b"later");
    }

    #[tokio::test]
    async fn estimate_uses_stored_metadata() {
        let resolver = resolver_over(InMemoryBinaryStore::new());
        let media = resolver
            .persist_media(&blob(&[0u8; 1234]), "timeline")
            .await
            .unwrap()
            .media;
        assert_eq!(resolver.estimate_size(&media).await, 1234);
    }

    #[tokio::test]
    async fn assets_load_from_root_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/a.png"), b"png!").unwrap();
        let resolver =
            resolver_over(InMemoryBinaryStore::new()).with_asset_root(dir.path());

        let loaded = resolver.load_asset("assets/a.png").await.unwrap();
        assert_eq!(loaded.bytes.as_ref(), b"png!");
        assert_eq!(loaded.mime, "image/png");
        assert_eq!(
            resolver
                .estimate_size(&MediaRef::Inline("assets/a.png".into()))
                .await,
            4
        );
        assert!(matches!(
            resolver.load_asset("../secret").await,
            Err(ResolveError::AssetUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn durable_refs_survive_reload_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let media = {
            let store = FsBinaryStore::open(dir.path()).await.unwrap();
            let resolver = ReferenceResolver::new(Arc::new(store));
            resolver.persist_media(&blob(b"kept"), "timeline").await.unwrap().media
        };
        let store = FsBinaryStore::open(dir.path()).await.unwrap();
        let reloaded = ReferenceResolver::new(Arc::new(store));
        assert_eq!(bytes_of(&reloaded, &media).await, b"kept");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transient_persists_get_distinct_handles() {
        let resolver = Arc::new(resolver_over(InMemoryBinaryStore::unavailable()));
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move {
                    resolver
                        .persist_media(&blob(format!("{i}").as_bytes()), "timeline")
                        .await
                        .unwrap()
                        .media
                })
            })
            .collect();
        let refs: Vec<MediaRef> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let unique: std::collections::HashSet<_> = refs.iter().collect();
        assert_eq!(unique.len(), 32);
        assert_eq!(resolver.transient_count(), 32);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_blob_roundtrips(payload in proptest::collection::vec(any::<u8>(), 0..512), available in any::<bool>()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryBinaryStore::new();
                store.set_available(available);
                let resolver = resolver_over(store);
                let media = resolver
                    .persist_media(&MediaBlob::new(payload.clone(), "image/jpeg", "p.jpg"), "timeline")
                    .await
                    .unwrap()
                    .media;
                assert_eq!(bytes_of(&resolver, &media).await, payload);
            });
        }
    }
}
