//! Collection and size projection: the cheap stages that run before any
//! media is resolved.

use std::collections::HashMap;

use keepsake_model::{AvatarRoster, BlockBody, Document, MediaSite};
use keepsake_render::PreloadManifest;
use keepsake_resolver::MediaSource;
use keepsake_types::{estimate_decoded_len, MediaRef};

/// One distinct reference to inline, with every site that uses it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportItem {
    pub media: MediaRef,
    pub sites: Vec<MediaSite>,
}

fn needs_inlining(media: &MediaRef, with_assets: bool) -> bool {
    match media {
        MediaRef::Stored(_) | MediaRef::Transient(_) => true,
        MediaRef::Inline(literal) => with_assets && !literal.starts_with("data:"),
    }
}

fn all_sites<'a>(document: &'a Document, roster: &'a AvatarRoster) -> Vec<(MediaSite, &'a MediaRef)> {
    let mut sites = document.media_sites();
    sites.extend(
        roster
            .photos()
            .map(|(id, photo)| (MediaSite::Avatar(id.to_string()), photo)),
    );
    sites
}

/// Distinct references that are not already self-contained, in first-use
/// order. Asset paths count only when `with_assets` is set.
pub fn collect(document: &Document, roster: &AvatarRoster, with_assets: bool) -> Vec<ExportItem> {
    let mut items: Vec<ExportItem> = Vec::new();
    let mut seen: HashMap<&MediaRef, usize> = HashMap::new();
    for (site, media) in all_sites(document, roster) {
        if !needs_inlining(media, with_assets) {
            continue;
        }
        match seen.get(media) {
            Some(&at) => items[at].sites.push(site),
            None => {
                seen.insert(media, items.len());
                items.push(ExportItem {
                    media: media.clone(),
                    sites: vec![site],
                });
            }
        }
    }
    items
}

/// Projected payload size in bytes: collected items by stored metadata,
/// literals already inline by their encoded length, plus custom music.
pub async fn projected_size(
    source: &dyn MediaSource,
    items: &[ExportItem],
    document: &Document,
    roster: &AvatarRoster,
) -> u64 {
    let estimates = futures::future::join_all(items.iter().map(|item| source.estimate_size(&item.media))).await;
    let pending: u64 = estimates.iter().sum();

    let inline: u64 = all_sites(document, roster)
        .into_iter()
        .filter_map(|(_, media)| match media {
            MediaRef::Inline(literal) if literal.starts_with("data:") => {
                Some(estimate_decoded_len(literal.len()))
            }
            _ => None,
        })
        .sum();

    let music = match &document.music.data {
        MediaRef::Inline(literal) if literal.starts_with("data:") => estimate_decoded_len(literal.len()),
        _ => 0,
    };
    pending + inline + music
}

/// Every self-contained image keyed by its site, for the viewer's fallback.
pub fn preload_manifest(document: &Document, roster: &AvatarRoster) -> PreloadManifest {
    let mut manifest = PreloadManifest::new();
    for node in &document.nodes {
        for block in &node.contents {
            if let BlockBody::Image {
                media: MediaRef::Inline(literal),
                ..
            } = &block.body
            {
                if literal.starts_with("data:") {
                    let site = MediaSite::Node {
                        node: node.id,
                        content: block.content_id.clone(),
                    };
                    manifest.insert(site.preload_key(), literal.clone());
                }
            }
        }
    }
    for block in &document.standalone {
        if let BlockBody::Image {
            media: MediaRef::Inline(literal),
            ..
        } = &block.body
        {
            if literal.starts_with("data:") {
                manifest.insert(MediaSite::Standalone(block.id.clone()).preload_key(), literal.clone());
            }
        }
    }
    for (id, photo) in roster.photos() {
        if let MediaRef::Inline(literal) = photo {
            if literal.starts_with("data:") {
                manifest.insert(MediaSite::Avatar(id.to_string()).preload_key(), literal.clone());
            }
        }
    }
    manifest
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use keepsake_model::StoryNode;
    use keepsake_types::{MediaId, NodeId, TransientHandle};

    use super::*;

    fn stored(raw: &str) -> MediaRef {
        MediaRef::Stored(MediaId::parse(raw).unwrap())
    }

    fn document() -> Document {
        let mut doc = Document::new();
        doc.nodes.push(StoryNode::blank(NodeId::new(1)));
        doc.nodes.push(StoryNode::blank(NodeId::new(2)));
        doc.add_content_block(0, BlockBody::image(stored("img_1_a"), "")).unwrap();
        doc.add_content_block(0, BlockBody::image(MediaRef::Inline("assets/x.jpg".into()), ""))
            .unwrap();
        doc.add_content_block(1, BlockBody::image(stored("img_1_a"), "")).unwrap();
        doc.add_content_block(1, BlockBody::video(MediaRef::Transient(TransientHandle::stale())))
            .unwrap();
        doc.add_content_block(
            1,
            BlockBody::image(MediaRef::Inline("data:image/png;base64,AAAA".into()), ""),
        )
        .unwrap();
        doc
    }

    fn roster() -> AvatarRoster {
        let mut photos = BTreeMap::new();
        photos.insert("a1".to_string(), stored("img_1_avatar"));
        AvatarRoster::from_parts(photos, BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn shared_references_collapse_into_one_item() {
        let items = collect(&document(), &roster(), false);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].media, stored("img_1_a"));
        assert_eq!(items[0].sites.len(), 2);
        assert!(items[1].media.is_transient());
        assert_eq!(items[2].sites, vec![MediaSite::Avatar("a1".into())]);
    }

    #[test]
    fn asset_paths_collected_only_with_assets() {
        let items = collect(&document(), &AvatarRoster::default(), true);
        assert!(items
            .iter()
            .any(|item| item.media == MediaRef::Inline("assets/x.jpg".into())));
    }

    #[test]
    fn preload_lists_inline_images_only() {
        let manifest = preload_manifest(&document(), &roster());
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("node_2_c_2_2"), Some("data:image/png;base64,AAAA"));
    }
}
