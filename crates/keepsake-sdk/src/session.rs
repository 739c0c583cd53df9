use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use keepsake_docstore::{
    DocStoreError, DocStoreResult, DocStoreUsage, DocumentStore, DocumentStoreExt,
    JsonFileDocumentStore, StoreKey, UsageLevel, format_size,
};
use keepsake_export::{ExportArtifact, ExportPipeline};
use keepsake_model::legacy::{decode_photo, upgrade_music, upgrade_standalone};
use keepsake_model::{
    clone_default_document, upgrade_timeline, AvatarRoster, BlockBody, BlockField, BlockKind,
    Direction, Document, EndingField, ImageOffset, MediaSite, MoveOutcome, MusicConfig, NodeField,
    SCHEMA_VERSION,
};
use keepsake_render::{hydrate_within, render, DisplayTree, HydrateReport};
use keepsake_resolver::ReferenceResolver;
use keepsake_store::{BinaryObjectStore, FsBinaryStore, InMemoryBinaryStore, MediaBlob, StoreUsage};
use keepsake_types::{BlockId, ContentId, DataUrl, MediaKind, MediaRef, NodeId};

use crate::backup::{store_entries, Backup};
use crate::config::KeepsakeConfig;
use crate::error::{SdkError, SdkResult};
use crate::notice::Notice;

const TIMELINE: &str = "timeline";
const STANDALONE: &str = "standalone";

/// Read the document from `docs`, running the legacy upgrade when the
/// stored schema is older than [`SCHEMA_VERSION`]. Returns whether the
/// upgrade ran.
fn load_document(docs: &dyn DocumentStore) -> (Document, bool) {
    let version: u32 = docs.load(StoreKey::SchemaVersion).unwrap_or(0);
    let upgrade = version < SCHEMA_VERSION;
    let (nodes, standalone, music) = if upgrade {
        tracing::info!(from = version, to = SCHEMA_VERSION, "upgrading stored document");
        (
            docs.load_value(StoreKey::Timeline).map(|v| upgrade_timeline(&v)),
            docs.load_value(StoreKey::StandaloneBlocks)
                .map(|v| upgrade_standalone(&v))
                .unwrap_or_default(),
            docs.load_value(StoreKey::Music).and_then(|v| upgrade_music(&v)),
        )
    } else {
        (
            docs.load(StoreKey::Timeline),
            docs.load(StoreKey::StandaloneBlocks).unwrap_or_default(),
            docs.load(StoreKey::Music),
        )
    };
    let mut document = Document {
        nodes: nodes.unwrap_or_else(|| clone_default_document().nodes),
        standalone,
        ending: docs.load(StoreKey::Ending).unwrap_or_default(),
        music: music.unwrap_or_default(),
    };
    document.repair();
    (document, upgrade)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> DocStoreResult<String> {
    serde_json::to_string(value).map_err(|e| DocStoreError::Serialization(e.to_string()))
}

/// Write all document keys as one batch, so a refused save leaves the
/// previous document whole.
fn write_document(docs: &dyn DocumentStore, document: &Document) -> DocStoreResult<()> {
    docs.save_batch_raw(&[
        (StoreKey::Timeline.as_str(), to_json(&document.nodes)?),
        (StoreKey::StandaloneBlocks.as_str(), to_json(&document.standalone)?),
        (StoreKey::Ending.as_str(), to_json(&document.ending)?),
        (StoreKey::Music.as_str(), to_json(&document.music)?),
        (StoreKey::SchemaVersion.as_str(), to_json(&SCHEMA_VERSION)?),
    ])
}

fn load_map<T: serde::de::DeserializeOwned>(docs: &dyn DocumentStore, key: StoreKey) -> BTreeMap<String, T> {
    docs.load(key).unwrap_or_default()
}

fn category_of(site: &MediaSite) -> &'static str {
    match site {
        MediaSite::Node { .. } => TIMELINE,
        MediaSite::Standalone(_) => STANDALONE,
        MediaSite::Avatar(_) => "avatar",
    }
}

fn block_kind_for(media: MediaKind) -> Option<BlockKind> {
    match media {
        MediaKind::Image => Some(BlockKind::Image),
        MediaKind::Video => Some(BlockKind::Video),
        MediaKind::Audio | MediaKind::Other => None,
    }
}

/// One editing session over a pair of stores.
///
/// The session owns the only mutable copy of the document. Every mutation
/// is followed by a full persist and a full re-render. Recoverable problems
/// (degraded media storage, a full document store, moves at a boundary)
/// are queued as [`Notice`]s and drained with [`EditorSession::take_notices`].
pub struct EditorSession {
    config: KeepsakeConfig,
    docs: Arc<dyn DocumentStore>,
    resolver: ReferenceResolver,
    document: Document,
    tree: DisplayTree,
    edit_mode: bool,
    notices: Vec<Notice>,
}

impl EditorSession {
    /// Open the on-disk stores under `config.data_dir`.
    ///
    /// A media directory that cannot be opened degrades to session-only
    /// media rather than failing.
    pub async fn open(config: KeepsakeConfig) -> SdkResult<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let docs = JsonFileDocumentStore::open_with_capacity(
            config.documents_path(),
            config.document_store_capacity,
        )?;
        let media: Arc<dyn BinaryObjectStore> = if config.media_store.enabled {
            match FsBinaryStore::open(config.media_dir()).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!("media store unavailable, using session-only media: {}", e);
                    Arc::new(InMemoryBinaryStore::unavailable())
                }
            }
        } else {
            tracing::info!("media store disabled by configuration");
            Arc::new(InMemoryBinaryStore::unavailable())
        };
        Self::with_stores(config, Arc::new(docs), media)
    }

    /// Build a session over existing stores.
    pub fn with_stores(
        config: KeepsakeConfig,
        docs: Arc<dyn DocumentStore>,
        media: Arc<dyn BinaryObjectStore>,
    ) -> SdkResult<Self> {
        let mut resolver = ReferenceResolver::new(media);
        if let Some(root) = &config.export.asset_root {
            resolver = resolver.with_asset_root(root.clone());
        }
        let (document, upgraded) = load_document(docs.as_ref());
        let edit_mode = docs.load(StoreKey::EditorMode).unwrap_or(false);
        let tree = render(&document);
        let mut session = Self {
            config,
            docs,
            resolver,
            document,
            tree,
            edit_mode,
            notices: Vec::new(),
        };
        if upgraded {
            session.save_document()?;
        }
        tracing::debug!(
            session = %session.resolver.session().short_id(),
            nodes = session.document.node_count(),
            "editor session ready"
        );
        Ok(session)
    }

    // ---- accessors ----

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The tree from the last render. Media that needs a lookup is pending.
    pub fn tree(&self) -> &DisplayTree {
        &self.tree
    }

    pub fn config(&self) -> &KeepsakeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// A fresh render with every pending slot resolved. A lookup that runs
    /// past the configured per-item timeout leaves a failure placeholder.
    pub async fn hydrated_tree(&self) -> (DisplayTree, HydrateReport) {
        let mut tree = render(&self.document);
        let item_timeout = Duration::from_millis(self.config.export.item_timeout_ms);
        let report = hydrate_within(&mut tree, &self.resolver, None, item_timeout).await;
        (tree, report)
    }

    // ---- persistence ----

    fn absorb_quota(&mut self, result: DocStoreResult<()>) -> SdkResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(DocStoreError::QuotaExceeded { key, needed, capacity }) => {
                tracing::warn!(%key, needed, capacity, "document store full; change not saved");
                self.notices.push(Notice::error(format!(
                    "Storage is full ({} needed, {} available); the last change was not saved. \
                     Remove some media or export a backup.",
                    format_size(needed),
                    format_size(capacity)
                )));
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save_document(&mut self) -> SdkResult<bool> {
        let result = write_document(self.docs.as_ref(), &self.document);
        let saved = self.absorb_quota(result)?;
        if saved {
            let usage = self.docs.usage()?;
            if usage.level() == UsageLevel::Danger {
                self.notices.push(Notice::warning(format!(
                    "Storage is {:.0}% full",
                    usage.percentage
                )));
            }
        }
        Ok(saved)
    }

    /// Move any session-only media that the store now accepts into it.
    async fn upgrade_transients(&mut self) {
        let mut pending: Vec<(MediaRef, &'static str)> = Vec::new();
        for (site, media) in self.document.media_sites() {
            if media.is_transient() && !pending.iter().any(|(m, _)| m == media) {
                pending.push((media.clone(), category_of(&site)));
            }
        }
        let mut upgraded = HashMap::new();
        for (media, category) in pending {
            if let Some(stored) = self.resolver.upgrade_transient(&media, category).await {
                upgraded.insert(media, stored);
            }
        }
        if upgraded.is_empty() {
            return;
        }
        self.document.for_each_media_mut(|_, media| {
            if let Some(stored) = upgraded.get(&*media) {
                *media = stored.clone();
            }
        });
        self.notices.push(Notice::success(format!(
            "{} media item(s) moved to durable storage",
            upgraded.len()
        )));
    }

    /// Persist the whole document, then re-render. Returns `false` when the
    /// document store refused the write.
    async fn persist(&mut self) -> SdkResult<bool> {
        self.upgrade_transients().await;
        let saved = self.save_document()?;
        self.tree = render(&self.document);
        Ok(saved)
    }

    async fn release(&self, media: &MediaRef) {
        if let Err(e) = self.resolver.release(media).await {
            tracing::warn!(%media, "failed to release media: {}", e);
        }
    }

    /// Store an upload and report degraded mode.
    async fn upload(&mut self, blob: &MediaBlob, category: &str) -> SdkResult<MediaRef> {
        let persisted = self.resolver.persist_media(blob, category).await?;
        if let Some(reason) = &persisted.degraded {
            self.notices.push(Notice::warning(format!(
                "\"{}\" is kept for this session only ({reason}); add it again after a reload",
                blob.original_name
            )));
        }
        Ok(persisted.media)
    }

    async fn media_body(&mut self, blob: &MediaBlob, category: &str) -> SdkResult<BlockBody> {
        let kind = block_kind_for(blob.kind()).ok_or_else(|| {
            SdkError::InvalidMedia(format!("{} ({})", blob.original_name, blob.mime))
        })?;
        let media = self.upload(blob, category).await?;
        Ok(match kind {
            BlockKind::Video => BlockBody::video(media),
            _ => BlockBody::image(media, blob.original_name.clone()),
        })
    }

    fn check_replacement(current: BlockKind, blob: &MediaBlob) -> SdkResult<()> {
        match block_kind_for(blob.kind()) {
            Some(kind) if kind == current => Ok(()),
            _ => Err(SdkError::InvalidMedia(format!(
                "cannot put {} ({}) into a {current} block",
                blob.original_name, blob.mime
            ))),
        }
    }

    async fn after_move(&mut self, outcome: MoveOutcome, edge: &str) -> SdkResult<MoveOutcome> {
        if outcome.moved() {
            self.persist().await?;
        } else {
            self.notices.push(Notice::info(edge));
        }
        Ok(outcome)
    }

    // ---- edit mode ----

    pub fn enter_edit_mode(&mut self) -> SdkResult<()> {
        self.edit_mode = true;
        let result = self.docs.save(StoreKey::EditorMode, &true);
        self.absorb_quota(result)?;
        Ok(())
    }

    /// Leave edit mode, saving the document first.
    pub async fn exit_edit_mode(&mut self) -> SdkResult<()> {
        if self.persist().await? {
            self.notices.push(Notice::success("Changes saved"));
        }
        self.edit_mode = false;
        let result = self.docs.save(StoreKey::EditorMode, &false);
        self.absorb_quota(result)?;
        Ok(())
    }

    // ---- nodes ----

    pub async fn add_node(&mut self) -> SdkResult<NodeId> {
        let id = self.document.add_node();
        self.persist().await?;
        Ok(id)
    }

    /// Delete a node and release the media its blocks held.
    pub async fn delete_node(&mut self, index: usize) -> SdkResult<()> {
        let removed = self.document.delete_node(index)?;
        if !self.persist().await? {
            return Ok(());
        }
        for block in &removed.contents {
            if let Some(media) = block.body.media() {
                self.release(media).await;
            }
        }
        Ok(())
    }

    pub async fn move_node(&mut self, index: usize, direction: Direction) -> SdkResult<MoveOutcome> {
        let outcome = self.document.move_node(index, direction)?;
        self.after_move(outcome, "This moment is already at the edge of the timeline")
            .await
    }

    pub async fn update_node_field(&mut self, index: usize, field: NodeField) -> SdkResult<()> {
        self.document.update_node_field(index, field)?;
        self.persist().await?;
        Ok(())
    }

    // ---- content blocks ----

    pub async fn add_text_block(&mut self, node: usize, text: &str) -> SdkResult<ContentId> {
        let id = self.document.add_content_block(node, BlockBody::text(text))?;
        self.persist().await?;
        Ok(id)
    }

    /// Add an image or video block from an upload.
    pub async fn add_media_block(&mut self, node: usize, blob: &MediaBlob) -> SdkResult<ContentId> {
        self.document.node(node)?;
        let body = self.media_body(blob, TIMELINE).await?;
        let id = self.document.add_content_block(node, body)?;
        self.persist().await?;
        Ok(id)
    }

    pub async fn delete_content_block(&mut self, node: usize, index: usize) -> SdkResult<()> {
        let removed = self.document.delete_content_block(node, index)?;
        if self.persist().await? {
            if let Some(media) = removed.body.media() {
                self.release(media).await;
            }
        }
        Ok(())
    }

    pub async fn move_content_block(
        &mut self,
        node: usize,
        index: usize,
        direction: Direction,
    ) -> SdkResult<MoveOutcome> {
        let outcome = self.document.move_content_block(node, index, direction)?;
        self.after_move(outcome, "This block is already at the edge of its moment")
            .await
    }

    pub async fn update_content_block(
        &mut self,
        node: usize,
        index: usize,
        field: BlockField,
    ) -> SdkResult<()> {
        self.document.update_content_block(node, index, field)?;
        self.persist().await?;
        Ok(())
    }

    /// Swap a media block's file. The old media is released.
    pub async fn replace_block_media(
        &mut self,
        node: usize,
        index: usize,
        blob: &MediaBlob,
    ) -> SdkResult<()> {
        let current = self.document.content_block(node, index)?.body.kind();
        Self::check_replacement(current, blob)?;
        let media = self.upload(blob, TIMELINE).await?;
        let old = self.document.replace_block_media(node, index, media)?;
        if self.persist().await? {
            self.release(&old).await;
        }
        Ok(())
    }

    // ---- standalone blocks ----

    pub async fn add_standalone_text(&mut self, insert_after: i64, text: &str) -> SdkResult<BlockId> {
        let id = self.document.add_standalone_block(insert_after, BlockBody::text(text));
        self.persist().await?;
        Ok(id)
    }

    pub async fn add_standalone_media(
        &mut self,
        insert_after: i64,
        blob: &MediaBlob,
    ) -> SdkResult<BlockId> {
        let body = self.media_body(blob, STANDALONE).await?;
        let id = self.document.add_standalone_block(insert_after, body);
        self.persist().await?;
        Ok(id)
    }

    pub async fn delete_standalone_block(&mut self, id: &BlockId) -> SdkResult<()> {
        let removed = self.document.delete_standalone_block(id)?;
        if self.persist().await? {
            if let Some(media) = removed.body.media() {
                self.release(media).await;
            }
        }
        Ok(())
    }

    pub async fn move_standalone_block(
        &mut self,
        id: &BlockId,
        direction: Direction,
    ) -> SdkResult<MoveOutcome> {
        let outcome = self.document.move_standalone_block(id, direction)?;
        self.after_move(outcome, "This block is already at the edge of the timeline")
            .await
    }

    pub async fn update_standalone_block(&mut self, id: &BlockId, field: BlockField) -> SdkResult<()> {
        self.document.update_standalone_block(id, field)?;
        self.persist().await?;
        Ok(())
    }

    pub async fn replace_standalone_media(&mut self, id: &BlockId, blob: &MediaBlob) -> SdkResult<()> {
        let current = self.document.standalone(id)?.body.kind();
        Self::check_replacement(current, blob)?;
        let media = self.upload(blob, STANDALONE).await?;
        let old = self.document.replace_standalone_media(id, media)?;
        if self.persist().await? {
            self.release(&old).await;
        }
        Ok(())
    }

    // ---- ending and music ----

    pub async fn update_ending_field(&mut self, field: EndingField) -> SdkResult<()> {
        self.document.update_ending_field(field);
        self.persist().await?;
        Ok(())
    }

    /// Use an uploaded track as background music. The track is stored
    /// inline; if the document store cannot hold it the previous track stays.
    pub async fn set_music(&mut self, blob: &MediaBlob) -> SdkResult<()> {
        if blob.kind() != MediaKind::Audio {
            return Err(SdkError::InvalidMedia(format!(
                "{} ({}) is not audio",
                blob.original_name, blob.mime
            )));
        }
        let music = MusicConfig {
            name: blob.original_name.clone(),
            size_label: format_size(blob.len() as u64),
            data: MediaRef::Inline(DataUrl::new(blob.mime.clone(), blob.bytes.to_vec()).encode()),
        };
        let previous = self.document.set_music(music);
        if !self.persist().await? {
            self.document.set_music(previous);
            self.tree = render(&self.document);
        }
        Ok(())
    }

    pub async fn reset_music(&mut self) -> SdkResult<()> {
        self.document.set_music(MusicConfig::default());
        self.persist().await?;
        Ok(())
    }

    // ---- avatar game state ----

    /// The landing mini-game's avatars, read from its store keys.
    pub fn avatar_roster(&self) -> AvatarRoster {
        let docs = self.docs.as_ref();
        let photos = load_map::<serde_json::Value>(docs, StoreKey::AvatarPhotos)
            .into_iter()
            .filter_map(|(id, raw)| decode_photo(&raw).map(|photo| (id, photo)))
            .collect();
        let names = load_map::<String>(docs, StoreKey::AvatarNames);
        let offsets = load_map::<ImageOffset>(docs, StoreKey::AvatarOffsets);
        let scales = load_map::<f64>(docs, StoreKey::AvatarScales);
        AvatarRoster::from_parts(photos, names, offsets, scales)
    }

    // ---- export, backup and reset ----

    /// Build the self-contained HTML artifact. Skipped items become a
    /// warning notice; an over-budget story is an error.
    pub async fn export(&mut self) -> SdkResult<ExportArtifact> {
        let roster = self.avatar_roster();
        let options = self.config.export_options();
        let artifact = ExportPipeline::new(&self.resolver, options)
            .run(&self.document, &roster)
            .await?;
        if artifact.skipped.is_empty() {
            self.notices.push(Notice::success(format!(
                "Exported {} ({})",
                artifact.file_name,
                format_size(artifact.len() as u64)
            )));
        } else {
            self.notices.push(Notice::warning(artifact.skipped.to_string()));
        }
        Ok(artifact)
    }

    pub fn backup(&self) -> Backup {
        Backup::of(&self.document)
    }

    /// Write each field of a backup back into the document store verbatim,
    /// then reload. Returns how many fields were written.
    pub fn import_backup(&mut self, json: &str) -> SdkResult<usize> {
        let entries = store_entries(json)?;
        let mut written = 0;
        for (key, raw) in &entries {
            let result = self.docs.save_raw(key.as_str(), raw);
            if !self.absorb_quota(result)? {
                break;
            }
            written += 1;
        }
        // Imported data may predate the current schema.
        self.docs.remove(StoreKey::SchemaVersion.as_str())?;
        let (document, _) = load_document(self.docs.as_ref());
        self.document = document;
        self.save_document()?;
        self.tree = render(&self.document);
        tracing::info!(written, "imported backup");
        self.notices.push(Notice::success(format!("Imported {written} field(s) from backup")));
        Ok(written)
    }

    /// Remove the saved story. Media and avatar state are kept; the
    /// session shows the built-in story afterwards.
    pub fn clear_all(&mut self) -> SdkResult<usize> {
        let removed = self.docs.clear_all()?;
        self.document = clone_default_document();
        self.edit_mode = false;
        self.tree = render(&self.document);
        self.notices.push(Notice::info("All saved story data cleared"));
        Ok(removed)
    }

    /// Replace the story with the built-in one and save it.
    pub async fn reset_to_default(&mut self) -> SdkResult<()> {
        self.document = clone_default_document();
        self.persist().await?;
        Ok(())
    }

    // ---- usage ----

    pub fn usage(&self) -> SdkResult<DocStoreUsage> {
        Ok(self.docs.usage()?)
    }

    pub async fn media_usage(&self) -> SdkResult<StoreUsage> {
        Ok(self.resolver.store().usage().await?)
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("data_dir", &self.config.data_dir)
            .field("nodes", &self.document.node_count())
            .field("edit_mode", &self.edit_mode)
            .field("resolver", &self.resolver)
            .finish()
    }
}
