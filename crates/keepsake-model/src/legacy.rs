//! One-time upgrade from the schema v1 document shapes.
//!
//! Version 1 stored media as prefix-encoded `src` strings (`indexeddb:<id>`,
//! `blob:...`, `data:...` or an asset path) and came in two node shapes:
//! `description` plus a flat `media` list, or an untyped `contents` list.
//! Everything here runs once, when the store's `schema_version` is below
//! [`SCHEMA_VERSION`]; afterwards documents are read as plain v2 JSON.

use std::collections::HashSet;

use keepsake_types::{BlockId, ContentId, MediaRef, NodeId};
use serde::Deserialize;
use serde_json::Value;

use crate::block::{BlockBody, ContentBlock, StandaloneBlock};
use crate::node::StoryNode;
use crate::settings::MusicConfig;

/// Current document schema version.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyBlock {
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
    src: Option<String>,
    alt: Option<String>,
    caption: Option<String>,
    poster: Option<String>,
    content_id: Option<String>,
    id: Option<String>,
    insert_after: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyNode {
    id: Value,
    date: String,
    title: Option<String>,
    description: Option<String>,
    media: Vec<LegacyBlock>,
    contents: Option<Vec<LegacyBlock>>,
    is_highlight: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyMusic {
    name: Option<String>,
    size: Option<String>,
    data: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LegacyBlock {
    /// Convert to a typed body. Media blocks whose `src` is empty are
    /// dropped; unknown types are dropped.
    fn into_body(self) -> Option<BlockBody> {
        let media = self.src.as_deref().and_then(MediaRef::from_legacy_src);
        match self.kind.as_str() {
            "text" => Some(BlockBody::text(self.content.unwrap_or_default())),
            "image" => Some(BlockBody::Image {
                media: media?,
                alt: self.alt.unwrap_or_default(),
                caption: non_empty(self.caption),
            }),
            "video" => Some(BlockBody::Video {
                media: media?,
                poster: non_empty(self.poster),
            }),
            other => {
                tracing::warn!(kind = other, "dropping legacy block of unknown type");
                None
            }
        }
    }
}

fn legacy_node_id(raw: &Value, position: usize) -> NodeId {
    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    NodeId::new(parsed.unwrap_or(position as u64 + 1))
}

/// v1 nodes of the first shape would otherwise parse as v2 nodes with no
/// contents, since unknown fields are ignored.
fn has_flat_media(entry: &Value) -> bool {
    entry.get("description").is_some() || entry.get("media").is_some()
}

fn upgrade_node(legacy: LegacyNode, position: usize) -> StoryNode {
    let id = legacy_node_id(&legacy.id, position);
    let mut node = StoryNode {
        id,
        date: legacy.date,
        title: non_empty(legacy.title),
        is_highlight: legacy.is_highlight,
        contents: Vec::new(),
        next_content_seq: 0,
    };
    match legacy.contents {
        Some(contents) => {
            let mut parsed = Vec::with_capacity(contents.len());
            for block in contents {
                let content_id = block
                    .content_id
                    .as_deref()
                    .and_then(|raw| ContentId::parse(raw).ok());
                if let Some(body) = block.into_body() {
                    parsed.push((content_id, body));
                }
            }
            // Seed the counter past every kept id before minting new ones.
            node.contents = parsed
                .iter()
                .filter_map(|(content_id, body)| {
                    content_id.clone().map(|content_id| ContentBlock {
                        content_id,
                        body: body.clone(),
                    })
                })
                .collect();
            node.repair_content_seq();
            node.contents.clear();

            let mut seen = HashSet::new();
            for (content_id, body) in parsed {
                match content_id {
                    Some(content_id) if seen.insert(content_id.clone()) => {
                        node.contents.push(ContentBlock { content_id, body })
                    }
                    _ => {
                        let minted = node.push_block(body);
                        seen.insert(minted);
                    }
                }
            }
        }
        None => {
            if let Some(description) = non_empty(legacy.description) {
                node.push_block(BlockBody::text(description));
            }
            for media in legacy.media {
                if let Some(body) = media.into_body() {
                    node.push_block(body);
                }
            }
        }
    }
    node.repair_content_seq();
    node
}

/// Upgrade a stored timeline value to v2 nodes.
///
/// Entries that already parse as v2 are kept as they are. Entries that are
/// not objects are skipped.
pub fn upgrade_timeline(raw: &Value) -> Vec<StoryNode> {
    let Some(entries) = raw.as_array() else {
        tracing::warn!("stored timeline is not a list; ignoring it");
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        if !has_flat_media(entry) {
            if let Ok(node) = serde_json::from_value::<StoryNode>(entry.clone()) {
                nodes.push(node);
                continue;
            }
        }
        match serde_json::from_value::<LegacyNode>(entry.clone()) {
            Ok(legacy) => nodes.push(upgrade_node(legacy, position)),
            Err(e) => tracing::warn!(position, "skipping unreadable timeline entry: {}", e),
        }
    }
    nodes
}

/// Upgrade stored standalone blocks to v2.
pub fn upgrade_standalone(raw: &Value) -> Vec<StandaloneBlock> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            if let Ok(block) = serde_json::from_value::<StandaloneBlock>(entry.clone()) {
                return Some(block);
            }
            let legacy: LegacyBlock = serde_json::from_value(entry.clone()).ok()?;
            let id = legacy
                .id
                .as_deref()
                .and_then(|raw| BlockId::parse(raw).ok())
                .unwrap_or_else(BlockId::generate);
            let insert_after = legacy.insert_after.unwrap_or(-1);
            Some(StandaloneBlock {
                id,
                insert_after,
                body: legacy.into_body()?,
            })
        })
        .collect()
}

/// Upgrade a stored music value (`{name, size, data}`) to v2.
pub fn upgrade_music(raw: &Value) -> Option<MusicConfig> {
    if let Ok(music) = serde_json::from_value::<MusicConfig>(raw.clone()) {
        return Some(music);
    }
    let legacy: LegacyMusic = serde_json::from_value(raw.clone()).ok()?;
    let defaults = MusicConfig::default();
    Some(MusicConfig {
        name: legacy.name.unwrap_or(defaults.name),
        size_label: legacy.size.unwrap_or(defaults.size_label),
        data: legacy
            .data
            .as_deref()
            .and_then(MediaRef::from_legacy_src)
            .unwrap_or(defaults.data),
    })
}

/// Decode one avatar photo entry: a v2 reference or a legacy `src` string.
pub fn decode_photo(raw: &Value) -> Option<MediaRef> {
    match raw {
        Value::String(src) => MediaRef::from_legacy_src(src),
        other => serde_json::from_value(other.clone()).ok(),
    }
}
