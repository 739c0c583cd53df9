//! The export pipeline: collect, size-check, inline, assemble.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use keepsake_model::{AvatarRoster, Document};
use keepsake_resolver::{MediaSource, ResolveError, ResolvedMedia};
use keepsake_types::MediaRef;

use crate::bundle::{BundleContent, ExportBundle};
use crate::collect::{collect, preload_manifest, projected_size, ExportItem};
use crate::error::{ExportError, ExportResult, PartialResolution, SkippedItem};
use crate::writer::ArtifactWriter;

/// Hard ceiling on projected artifact size.
pub const DEFAULT_SIZE_BUDGET: u64 = 100 * 1024 * 1024;

/// Per-item resolution window.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub size_budget: u64,
    pub item_timeout: Duration,
    pub title: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            size_budget: DEFAULT_SIZE_BUDGET,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            title: "Our Story".to_string(),
        }
    }
}

/// A finished export.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub file_name: String,
    pub html: String,
    pub bundle: ExportBundle,
    /// Items left out; empty on a clean export.
    pub skipped: PartialResolution,
}

impl ExportArtifact {
    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Write the artifact into `dir` under its file name.
    pub async fn write_to(&self, dir: &Path) -> ExportResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, self.html.as_bytes()).await?;
        Ok(path)
    }
}

/// Stand-in for media left out of an export: an empty inline literal,
/// which the viewer shows as the failure placeholder.
fn unavailable() -> MediaRef {
    MediaRef::Inline(String::new())
}

/// Runs exports against one media source.
pub struct ExportPipeline<'a> {
    source: &'a dyn MediaSource,
    options: ExportOptions,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(source: &'a dyn MediaSource, options: ExportOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export `document` plus the avatar roster.
    ///
    /// Fails only when the projected size is over budget or assembly
    /// fails. Items that cannot be resolved are reported in
    /// [`ExportArtifact::skipped`] and left out.
    pub async fn run(&self, document: &Document, roster: &AvatarRoster) -> ExportResult<ExportArtifact> {
        let mut doc = document.clone();
        let mut roster = roster.clone();

        let items = collect(&doc, &roster, self.source.has_assets());
        tracing::info!(items = items.len(), "collected media for export");

        let projected = projected_size(self.source, &items, &doc, &roster).await;
        if projected > self.options.size_budget {
            tracing::warn!(projected, budget = self.options.size_budget, "export over size budget");
            return Err(ExportError::over_budget(projected, self.options.size_budget));
        }
        tracing::debug!(projected, "export size within budget");

        let (inlined, skipped) = self.inline_all(items).await;
        doc.for_each_media_mut(|_, media| {
            *media = match inlined.get(&*media) {
                Some(literal) => literal.clone(),
                None if media.is_inline() => return,
                None => unavailable(),
            };
        });
        for avatar in &mut roster.avatars {
            avatar.photo = avatar
                .photo
                .take()
                .map(|photo| inlined.get(&photo).cloned().unwrap_or(photo))
                .filter(|photo| photo.is_inline() && *photo != unavailable());
        }
        if !skipped.is_empty() {
            tracing::warn!(skipped = skipped.len(), "export completed with skipped media");
        }

        let preload = preload_manifest(&doc, &roster);
        let music = doc.music.is_custom().then(|| doc.music.clone());
        let content = BundleContent {
            timeline: doc.nodes,
            standalone_blocks: doc.standalone,
            ending: doc.ending,
            music,
            avatars: roster.avatars,
            preload,
        };
        let bundle = ExportBundle::seal(content, Utc::now())?;
        let html = ArtifactWriter::new(self.options.title.clone()).write(&bundle)?;
        tracing::info!(bytes = html.len(), "export assembled");
        Ok(ExportArtifact {
            file_name: bundle.file_name(),
            html,
            bundle,
            skipped,
        })
    }

    async fn inline_one(&self, media: &MediaRef) -> Result<MediaRef, ResolveError> {
        let work = async {
            let resolved = match media {
                MediaRef::Inline(path) => ResolvedMedia::Bytes(self.source.load_asset(path).await?),
                other => self.source.resolve(other).await?,
            };
            Ok::<_, ResolveError>(resolved.into_inline_ref())
        };
        match tokio::time::timeout(self.options.item_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ResolveError::TimedOut(self.options.item_timeout.as_millis() as u64)),
        }
    }

    async fn inline_all(&self, items: Vec<ExportItem>) -> (HashMap<MediaRef, MediaRef>, PartialResolution) {
        let outcomes = futures::future::join_all(items.iter().map(|item| self.inline_one(&item.media))).await;
        let mut inlined = HashMap::new();
        let mut report = PartialResolution::default();
        for (item, outcome) in items.into_iter().zip(outcomes) {
            match outcome {
                Ok(literal) => {
                    inlined.insert(item.media, literal);
                }
                Err(e) => {
                    tracing::warn!(media = %item.media, "skipping media in export: {}", e);
                    report.skipped.push(SkippedItem {
                        media: item.media.to_string(),
                        sites: item.sites,
                        reason: e.to_string(),
                    });
                    inlined.insert(item.media, unavailable());
                }
            }
        }
        (inlined, report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use keepsake_model::{BlockBody, MediaSite, StoryNode};
    use keepsake_resolver::{ReferenceResolver, ResolveResult};
    use keepsake_store::{InMemoryBinaryStore, MediaBlob};
    use keepsake_types::{MediaId, NodeId, TransientHandle};

    use super::*;
    use crate::reader::read_bundle;

    /// Counts calls; every stored reference claims to be `each` bytes.
    struct CountingSource {
        each: u64,
        resolves: AtomicUsize,
        hang: Option<MediaId>,
    }

    impl CountingSource {
        fn new(each: u64) -> Self {
            Self {
                each,
                resolves: AtomicUsize::new(0),
                hang: None,
            }
        }
    }

    #[async_trait]
    impl MediaSource for CountingSource {
        async fn resolve(&self, media: &MediaRef) -> ResolveResult<ResolvedMedia> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            match media {
                MediaRef::Stored(id) if Some(id) == self.hang.as_ref() => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
                MediaRef::Stored(_) => Ok(ResolvedMedia::Bytes(MediaBlob::new(
                    b"img".to_vec(),
                    "image/jpeg",
                    "x.jpg",
                ))),
                MediaRef::Transient(handle) => Err(ResolveError::StaleReference(*handle)),
                MediaRef::Inline(literal) => Ok(ResolvedMedia::Literal(literal.clone())),
            }
        }

        async fn estimate_size(&self, media: &MediaRef) -> u64 {
            match media {
                MediaRef::Stored(_) => self.each,
                _ => 0,
            }
        }
    }

    fn stored(raw: &str) -> MediaRef {
        MediaRef::Stored(MediaId::parse(raw).unwrap())
    }

    fn document_with(media: Vec<MediaRef>) -> Document {
        let mut doc = Document::new();
        doc.nodes.push(StoryNode::blank(NodeId::new(1)));
        for m in media {
            doc.add_content_block(0, BlockBody::image(m, "")).unwrap();
        }
        doc
    }

    #[tokio::test]
    async fn oversized_export_is_rejected_before_any_resolve() {
        // Three 40 MB items: about 120 MB against a 100 MB budget.
        let source = CountingSource::new(40 * 1024 * 1024);
        let doc = document_with(vec![stored("img_1_a"), stored("img_1_b"), stored("img_1_c")]);
        let pipeline = ExportPipeline::new(&source, ExportOptions::default());
        let err = pipeline.run(&doc, &AvatarRoster::default()).await.unwrap_err();
        match err {
            ExportError::SizeBudgetExceeded { projected, budget, .. } => {
                assert_eq!(projected, 120 * 1024 * 1024);
                assert_eq!(budget, DEFAULT_SIZE_BUDGET);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(source.resolves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_stale_item_is_skipped_and_the_rest_inlined() {
        let source = CountingSource::new(1024);
        let doc = document_with(vec![
            stored("img_1_a"),
            stored("img_1_b"),
            MediaRef::Transient(TransientHandle::stale()),
            stored("img_1_c"),
            stored("img_1_d"),
        ]);
        let artifact = ExportPipeline::new(&source, ExportOptions::default())
            .run(&doc, &AvatarRoster::default())
            .await
            .unwrap();

        assert_eq!(artifact.skipped.len(), 1);
        assert!(artifact.skipped.skipped[0].reason.contains("stale"));
        assert_eq!(
            artifact.skipped.skipped[0].sites,
            vec![MediaSite::Node {
                node: NodeId::new(1),
                content: keepsake_types::ContentId::derive(NodeId::new(1), 2),
            }]
        );

        let bundle = read_bundle(&artifact.html).unwrap();
        let inline: Vec<_> = bundle.content.timeline[0]
            .contents
            .iter()
            .filter_map(|b| b.body.media())
            .filter(|m| m.is_self_contained())
            .collect();
        assert_eq!(inline.len(), 4);
        assert!(inline
            .iter()
            .all(|m| **m == MediaRef::Inline("data:image/jpeg;base64,aW1n".into())));
        assert_eq!(bundle.content.preload.len(), 4);

        let skipped_slot = bundle.content.timeline[0].contents[2].body.media().unwrap();
        assert_eq!(skipped_slot, &MediaRef::Inline(String::new()));
        let sealed = serde_json::to_string(&artifact.bundle).unwrap();
        assert!(!sealed.contains("\"transient\""));
        assert!(!sealed.contains("\"stored\""));
    }

    #[tokio::test]
    async fn hung_item_times_out_without_blocking_others() {
        let mut source = CountingSource::new(10);
        source.hang = Some(MediaId::parse("img_1_slow").unwrap());
        let doc = document_with(vec![stored("img_1_fast"), stored("img_1_slow")]);
        let options = ExportOptions {
            item_timeout: Duration::from_millis(50),
            ..ExportOptions::default()
        };
        let artifact = ExportPipeline::new(&source, options)
            .run(&doc, &AvatarRoster::default())
            .await
            .unwrap();
        assert_eq!(artifact.skipped.len(), 1);
        assert!(artifact.skipped.skipped[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn avatars_are_inlined_or_dropped() {
        let resolver = ReferenceResolver::new(Arc::new(InMemoryBinaryStore::new()));
        let photo = resolver
            .persist_media(&MediaBlob::new(b"face".to_vec(), "image/png", "f.png"), "avatar")
            .await
            .unwrap()
            .media;
        let mut photos = BTreeMap::new();
        photos.insert("a1".to_string(), photo);
        photos.insert("a2".to_string(), stored("img_1_missing"));
        let roster = AvatarRoster::from_parts(photos, BTreeMap::new(), BTreeMap::new(), BTreeMap::new());

        let artifact = ExportPipeline::new(&resolver, ExportOptions::default())
            .run(&Document::new(), &roster)
            .await
            .unwrap();
        let avatars = &artifact.bundle.content.avatars;
        assert!(avatars[0].photo.as_ref().unwrap().is_self_contained());
        assert_eq!(avatars[1].photo, None);
        assert_eq!(artifact.skipped.len(), 1);
        assert!(artifact.bundle.content.preload.get("avatar_a1").is_some());
    }

    #[tokio::test]
    async fn default_music_is_left_out_custom_music_kept() {
        let source = CountingSource::new(0);
        let mut doc = Document::new();
        let artifact = ExportPipeline::new(&source, ExportOptions::default())
            .run(&doc, &AvatarRoster::default())
            .await
            .unwrap();
        assert_eq!(artifact.bundle.content.music, None);

        doc.music.data = MediaRef::Inline("data:audio/mpeg;base64,AAAA".into());
        let artifact = ExportPipeline::new(&source, ExportOptions::default())
            .run(&doc, &AvatarRoster::default())
            .await
            .unwrap();
        assert!(artifact.bundle.content.music.is_some());
        assert!(artifact.file_name.starts_with("our-story-"));
        assert!(artifact.file_name.ends_with(".html"));
    }

    #[tokio::test]
    async fn seed_assets_inline_when_an_asset_root_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets/images");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("a.jpg"), b"jpeg").unwrap();

        let resolver = ReferenceResolver::new(Arc::new(InMemoryBinaryStore::new())).with_asset_root(dir.path());
        let doc = document_with(vec![
            MediaRef::Inline("assets/images/a.jpg".into()),
            MediaRef::Inline("assets/images/missing.jpg".into()),
        ]);
        let artifact = ExportPipeline::new(&resolver, ExportOptions::default())
            .run(&doc, &AvatarRoster::default())
            .await
            .unwrap();
        let media: Vec<_> = artifact.bundle.content.timeline[0]
            .contents
            .iter()
            .filter_map(|b| b.body.media().cloned())
            .collect();
        assert_eq!(media[0], MediaRef::Inline("data:image/jpeg;base64,anBlZw==".into()));
        assert_eq!(media[1], MediaRef::Inline("assets/images/missing.jpg".into()));
        assert_eq!(artifact.skipped.len(), 1);

        let path = artifact.write_to(dir.path()).await.unwrap();
        assert!(path.ends_with(&artifact.file_name));
    }
}
