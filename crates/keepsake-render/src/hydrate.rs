use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use keepsake_resolver::{MediaSource, ResolveError, ResolveResult, ResolvedMedia};
use keepsake_types::MediaRef;

use crate::preload::PreloadManifest;
use crate::tree::{DisplayTree, MediaSlot};

/// What [`hydrate`] did to the tree's pending slots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HydrateReport {
    pub resolved: usize,
    pub from_preload: usize,
    /// `(block key, reason)` for slots left showing the failure placeholder.
    pub failed: Vec<(String, String)>,
}

/// Resolve every pending slot concurrently and swap in the outcome.
///
/// A failed lookup falls back to the preload manifest entry for the same
/// block, and otherwise becomes [`MediaSlot::Failed`]. Errors never escape.
/// Each slot is updated as soon as its own lookup settles, so a lookup that
/// never finishes leaves only its own placeholder in place.
pub async fn hydrate(
    tree: &mut DisplayTree,
    source: &dyn MediaSource,
    preload: Option<&PreloadManifest>,
) -> HydrateReport {
    hydrate_slots(tree, source, preload, None).await
}

/// [`hydrate`], giving up on any single lookup after `item_timeout`. A slot
/// whose lookup times out is treated like any other failure.
pub async fn hydrate_within(
    tree: &mut DisplayTree,
    source: &dyn MediaSource,
    preload: Option<&PreloadManifest>,
    item_timeout: Duration,
) -> HydrateReport {
    hydrate_slots(tree, source, preload, Some(item_timeout)).await
}

async fn hydrate_slots(
    tree: &mut DisplayTree,
    source: &dyn MediaSource,
    preload: Option<&PreloadManifest>,
    item_timeout: Option<Duration>,
) -> HydrateReport {
    let pending: Vec<(usize, String, MediaRef)> = tree
        .blocks()
        .enumerate()
        .filter_map(|(i, block)| match block.content.slot() {
            Some(MediaSlot::Pending { media }) => Some((i, block.key.clone(), media.clone())),
            _ => None,
        })
        .collect();
    let mut report = HydrateReport::default();
    if pending.is_empty() {
        return report;
    }

    let mut lookups: FuturesUnordered<_> = pending
        .into_iter()
        .map(|(i, key, media)| async move {
            let outcome = match item_timeout {
                Some(limit) => match tokio::time::timeout(limit, source.resolve(&media)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ResolveError::TimedOut(limit.as_millis() as u64)),
                },
                None => source.resolve(&media).await,
            };
            (i, key, outcome)
        })
        .collect();

    while let Some((i, key, outcome)) = lookups.next().await {
        let next = settle(&mut report, key, outcome, preload);
        if let Some(slot) = tree.block_mut(i).and_then(|b| b.content.slot_mut()) {
            *slot = next;
        }
    }
    report
}

fn settle(
    report: &mut HydrateReport,
    key: String,
    outcome: ResolveResult<ResolvedMedia>,
    preload: Option<&PreloadManifest>,
) -> MediaSlot {
    match outcome {
        Ok(resolved) => {
            report.resolved += 1;
            MediaSlot::Ready {
                src: resolved.to_literal(),
            }
        }
        Err(e) => match preload.and_then(|p| p.get(&key)) {
            Some(literal) => {
                tracing::debug!(%key, "using preloaded image after lookup failed: {}", e);
                report.from_preload += 1;
                MediaSlot::Ready {
                    src: literal.to_string(),
                }
            }
            None => {
                tracing::warn!(%key, "media failed to load: {}", e);
                report.failed.push((key, e.to_string()));
                MediaSlot::Failed {
                    reason: e.to_string(),
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use keepsake_model::{BlockBody, Document, StoryNode};
    use keepsake_resolver::{MediaSource, ReferenceResolver, ResolveResult, ResolvedMedia};
    use keepsake_store::{InMemoryBinaryStore, MediaBlob};
    use keepsake_types::{MediaId, NodeId, TransientHandle};

    use super::*;
    use crate::tree::render;

    fn one_node() -> Document {
        let mut doc = Document::new();
        doc.nodes.push(StoryNode::blank(NodeId::new(1)));
        doc
    }

    #[tokio::test]
    async fn pending_slots_swap_to_ready() {
        let resolver = ReferenceResolver::new(Arc::new(InMemoryBinaryStore::new()));
        let media = resolver
            .persist_media(&MediaBlob::new(b"ok".to_vec(), "image/png", "a.png"), "timeline")
            .await
            .unwrap()
            .media;
        let mut doc = one_node();
        doc.add_content_block(0, BlockBody::image(media, "")).unwrap();

        let mut tree = render(&doc);
        assert_eq!(tree.pending_count(), 1);
        let report = hydrate(&mut tree, &resolver, None).await;
        assert_eq!(report.resolved, 1);
        let (_, slot) = tree.slots().next().unwrap();
        assert_eq!(
            slot,
            &MediaSlot::Ready {
                src: "data:image/png;base64,b2s=".into()
            }
        );
    }

    #[tokio::test]
    async fn failures_fall_back_to_preload_then_placeholder() {
        let resolver = ReferenceResolver::new(Arc::new(InMemoryBinaryStore::new()));
        let mut doc = one_node();
        doc.add_content_block(
            0,
            BlockBody::image(MediaRef::Stored(MediaId::parse("img_1_gone").unwrap()), ""),
        )
        .unwrap();
        doc.add_content_block(
            0,
            BlockBody::image(MediaRef::Transient(TransientHandle::stale()), ""),
        )
        .unwrap();

        let mut preload = PreloadManifest::new();
        preload.insert("node_1_c_1_0", "data:image/png;base64,AA==");

        let mut tree = render(&doc);
        let report = hydrate(&mut tree, &resolver, Some(&preload)).await;
        assert_eq!(report.from_preload, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "node_1_c_1_1");

        let slots: Vec<_> = tree.slots().map(|(_, s)| s.clone()).collect();
        assert!(slots[0].is_ready());
        assert!(matches!(slots[1], MediaSlot::Failed { .. }));
    }

    /// Resolves in reverse of request order.
    struct ReverseSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaSource for ReverseSource {
        async fn resolve(&self, media: &MediaRef) -> ResolveResult<ResolvedMedia> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            tokio::time::sleep(Duration::from_millis(40 - n * 10)).await;
            Ok(ResolvedMedia::Literal(format!("resolved:{media}")))
        }

        async fn estimate_size(&self, _media: &MediaRef) -> u64 {
            0
        }
    }

    /// Never settles for `img_1_hang`; everything else resolves at once.
    struct HangingSource;

    #[async_trait]
    impl MediaSource for HangingSource {
        async fn resolve(&self, media: &MediaRef) -> ResolveResult<ResolvedMedia> {
            if media.to_string().ends_with("img_1_hang") {
                futures::future::pending::<()>().await;
            }
            Ok(ResolvedMedia::Literal(format!("resolved:{media}")))
        }

        async fn estimate_size(&self, _media: &MediaRef) -> u64 {
            0
        }
    }

    fn with_hanging_block() -> Document {
        let mut doc = one_node();
        for id in ["img_1_a", "img_1_hang", "img_1_b"] {
            doc.add_content_block(
                0,
                BlockBody::image(MediaRef::Stored(MediaId::parse(id).unwrap()), ""),
            )
            .unwrap();
        }
        doc
    }

    #[tokio::test]
    async fn hung_lookup_leaves_only_its_own_placeholder() {
        let doc = with_hanging_block();
        let mut tree = render(&doc);
        let timed_out = tokio::time::timeout(
            Duration::from_millis(300),
            hydrate(&mut tree, &HangingSource, None),
        )
        .await
        .is_err();
        assert!(timed_out);

        let slots: Vec<_> = tree.slots().map(|(_, s)| s.clone()).collect();
        assert!(slots[0].is_ready());
        assert!(matches!(slots[1], MediaSlot::Pending { .. }));
        assert!(slots[2].is_ready());
        assert_eq!(tree.pending_count(), 1);
    }

    #[tokio::test]
    async fn item_timeout_turns_a_hung_lookup_into_a_failure() {
        let doc = with_hanging_block();
        let mut tree = render(&doc);
        let report =
            hydrate_within(&mut tree, &HangingSource, None, Duration::from_millis(50)).await;
        assert_eq!(report.resolved, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "node_1_c_1_1");
        assert!(report.failed[0].1.contains("timed out"));
        assert_eq!(tree.pending_count(), 0);
    }

    #[tokio::test]
    async fn out_of_order_completion_lands_in_the_right_slot() {
        let mut doc = one_node();
        for i in 0..4 {
            doc.add_content_block(
                0,
                BlockBody::image(MediaRef::Stored(MediaId::parse(&format!("img_1_{i}")).unwrap()), ""),
            )
            .unwrap();
        }
        let source = ReverseSource {
            calls: AtomicUsize::new(0),
        };
        let mut tree = render(&doc);
        hydrate(&mut tree, &source, None).await;
        let srcs: Vec<String> = tree
            .slots()
            .map(|(_, slot)| match slot {
                MediaSlot::Ready { src } => src.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            srcs,
            (0..4)
                .map(|i| format!("resolved:stored:img_1_{i}"))
                .collect::<Vec<_>>()
        );
    }
}
