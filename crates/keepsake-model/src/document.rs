//! The editable document and every editing operation on it.
//!
//! Node and content-block operations address items by index, standalone
//! blocks by id. Moves that would cross an edge leave the document untouched
//! and report [`MoveOutcome::AtBoundary`].

use keepsake_types::{BlockId, ContentId, MediaRef, NodeId};
use serde::{Deserialize, Serialize};

use crate::block::{BlockBody, BlockField, ContentBlock, StandaloneBlock};
use crate::error::{ModelError, ModelResult};
use crate::node::{NodeField, StoryNode};
use crate::settings::{EndingConfig, EndingField, MusicConfig};

/// Direction of a single-step move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards the start of the timeline.
    Up,
    /// Towards the end of the timeline.
    Down,
}

impl Direction {
    pub fn delta(self) -> i64 {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
        }
    }

    pub fn parse(raw: &str) -> ModelResult<Self> {
        match raw {
            "up" | "-1" => Ok(Direction::Up),
            "down" | "+1" | "1" => Ok(Direction::Down),
            other => Err(ModelError::InvalidValue {
                field: "direction".to_string(),
                reason: format!("expected up or down, got `{other}`"),
            }),
        }
    }
}

/// Result of a move request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { from: i64, to: i64 },
    /// The item was already at the edge; nothing changed.
    AtBoundary,
}

impl MoveOutcome {
    pub fn moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

/// Where a media reference sits in the document (or next to it).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MediaSite {
    Node { node: NodeId, content: ContentId },
    Standalone(BlockId),
    Avatar(String),
}

impl MediaSite {
    /// Key used by the preloaded-image manifest.
    pub fn preload_key(&self) -> String {
        match self {
            MediaSite::Node { node, content } => format!("node_{node}_{content}"),
            MediaSite::Standalone(id) => format!("standalone_{id}"),
            MediaSite::Avatar(id) => format!("avatar_{id}"),
        }
    }
}

/// The whole story: timeline, standalone blocks and closing settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub nodes: Vec<StoryNode>,
    #[serde(default)]
    pub standalone: Vec<StandaloneBlock>,
    #[serde(default)]
    pub ending: EndingConfig,
    #[serde(default)]
    pub music: MusicConfig,
}

fn swap_target(index: usize, len: usize, direction: Direction) -> Option<usize> {
    let target = index as i64 + direction.delta();
    (target >= 0 && target < len as i64).then_some(target as usize)
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn max_anchor(&self) -> i64 {
        self.nodes.len() as i64 - 1
    }

    pub fn node(&self, index: usize) -> ModelResult<&StoryNode> {
        let len = self.nodes.len();
        self.nodes
            .get(index)
            .ok_or(ModelError::NodeIndexOutOfRange { index, len })
    }

    pub fn content_block(&self, node: usize, index: usize) -> ModelResult<&ContentBlock> {
        let owner = self.node(node)?;
        owner.contents.get(index).ok_or(ModelError::ContentIndexOutOfRange {
            node,
            index,
            len: owner.contents.len(),
        })
    }

    fn node_mut(&mut self, index: usize) -> ModelResult<&mut StoryNode> {
        let len = self.nodes.len();
        self.nodes
            .get_mut(index)
            .ok_or(ModelError::NodeIndexOutOfRange { index, len })
    }

    fn block_mut(&mut self, node: usize, index: usize) -> ModelResult<&mut ContentBlock> {
        let owner = self.node_mut(node)?;
        let len = owner.contents.len();
        owner
            .contents
            .get_mut(index)
            .ok_or(ModelError::ContentIndexOutOfRange { node, index, len })
    }

    pub fn standalone(&self, id: &BlockId) -> ModelResult<&StandaloneBlock> {
        self.standalone
            .iter()
            .find(|b| &b.id == id)
            .ok_or_else(|| ModelError::StandaloneNotFound(id.clone()))
    }

    fn standalone_mut(&mut self, id: &BlockId) -> ModelResult<&mut StandaloneBlock> {
        self.standalone
            .iter_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| ModelError::StandaloneNotFound(id.clone()))
    }

    /// Standalone blocks anchored at `anchor`, in insertion order.
    pub fn standalone_at(&self, anchor: i64) -> impl Iterator<Item = &StandaloneBlock> {
        self.standalone.iter().filter(move |b| b.insert_after == anchor)
    }

    // ---- nodes ----

    /// Append an empty node and return its id.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::allocate(self.nodes.iter().map(|n| &n.id));
        self.nodes.push(StoryNode::blank(id));
        id
    }

    /// Remove a node. Standalone blocks anchored after it move up to the
    /// previous node, and later anchors shift down by one.
    pub fn delete_node(&mut self, index: usize) -> ModelResult<StoryNode> {
        self.node(index)?;
        let removed = self.nodes.remove(index);
        let index = index as i64;
        for block in &mut self.standalone {
            if block.insert_after >= index {
                block.insert_after -= 1;
            }
        }
        self.clamp_anchors();
        Ok(removed)
    }

    pub fn move_node(&mut self, index: usize, direction: Direction) -> ModelResult<MoveOutcome> {
        self.node(index)?;
        Ok(match swap_target(index, self.nodes.len(), direction) {
            Some(target) => {
                self.nodes.swap(index, target);
                MoveOutcome::Moved {
                    from: index as i64,
                    to: target as i64,
                }
            }
            None => MoveOutcome::AtBoundary,
        })
    }

    pub fn update_node_field(&mut self, index: usize, field: NodeField) -> ModelResult<()> {
        self.node_mut(index)?.apply(field);
        Ok(())
    }

    // ---- content blocks ----

    pub fn add_content_block(&mut self, node: usize, body: BlockBody) -> ModelResult<ContentId> {
        Ok(self.node_mut(node)?.push_block(body))
    }

    pub fn delete_content_block(&mut self, node: usize, index: usize) -> ModelResult<ContentBlock> {
        self.block_mut(node, index)?;
        Ok(self.node_mut(node)?.contents.remove(index))
    }

    pub fn move_content_block(
        &mut self,
        node: usize,
        index: usize,
        direction: Direction,
    ) -> ModelResult<MoveOutcome> {
        self.block_mut(node, index)?;
        let contents = &mut self.node_mut(node)?.contents;
        Ok(match swap_target(index, contents.len(), direction) {
            Some(target) => {
                contents.swap(index, target);
                MoveOutcome::Moved {
                    from: index as i64,
                    to: target as i64,
                }
            }
            None => MoveOutcome::AtBoundary,
        })
    }

    pub fn update_content_block(
        &mut self,
        node: usize,
        index: usize,
        field: BlockField,
    ) -> ModelResult<()> {
        self.block_mut(node, index)?.body.apply(field)
    }

    /// Point a block at new media, returning the reference it replaced.
    pub fn replace_block_media(
        &mut self,
        node: usize,
        index: usize,
        media: MediaRef,
    ) -> ModelResult<MediaRef> {
        self.block_mut(node, index)?.body.replace_media(media)
    }

    // ---- standalone blocks ----

    /// Add a standalone block. The anchor is clamped into range.
    pub fn add_standalone_block(&mut self, insert_after: i64, body: BlockBody) -> BlockId {
        let id = BlockId::generate();
        let insert_after = insert_after.clamp(-1, self.max_anchor().max(-1));
        self.standalone.push(StandaloneBlock {
            id: id.clone(),
            insert_after,
            body,
        });
        id
    }

    pub fn delete_standalone_block(&mut self, id: &BlockId) -> ModelResult<StandaloneBlock> {
        let pos = self
            .standalone
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ModelError::StandaloneNotFound(id.clone()))?;
        Ok(self.standalone.remove(pos))
    }

    /// Shift a standalone block's anchor by one, within `[-1, nodeCount-1]`.
    pub fn move_standalone_block(
        &mut self,
        id: &BlockId,
        direction: Direction,
    ) -> ModelResult<MoveOutcome> {
        let max = self.max_anchor();
        let block = self.standalone_mut(id)?;
        let from = block.insert_after;
        let to = from + direction.delta();
        if to < -1 || to > max {
            return Ok(MoveOutcome::AtBoundary);
        }
        block.insert_after = to;
        Ok(MoveOutcome::Moved { from, to })
    }

    pub fn update_standalone_block(&mut self, id: &BlockId, field: BlockField) -> ModelResult<()> {
        self.standalone_mut(id)?.body.apply(field)
    }

    pub fn replace_standalone_media(
        &mut self,
        id: &BlockId,
        media: MediaRef,
    ) -> ModelResult<MediaRef> {
        self.standalone_mut(id)?.body.replace_media(media)
    }

    // ---- settings ----

    pub fn update_ending_field(&mut self, field: EndingField) {
        self.ending.apply(field);
    }

    /// Replace the music track, returning the previous one.
    pub fn set_music(&mut self, music: MusicConfig) -> MusicConfig {
        std::mem::replace(&mut self.music, music)
    }

    // ---- integrity ----

    /// Pull every standalone anchor into `[-1, nodeCount-1]`. Returns how
    /// many anchors changed.
    pub fn clamp_anchors(&mut self) -> usize {
        let max = self.max_anchor().max(-1);
        let mut changed = 0;
        for block in &mut self.standalone {
            let clamped = block.insert_after.clamp(-1, max);
            if clamped != block.insert_after {
                block.insert_after = clamped;
                changed += 1;
            }
        }
        changed
    }

    /// Fix up a document read from storage: clamp anchors and advance
    /// content counters past existing ids.
    pub fn repair(&mut self) {
        let clamped = self.clamp_anchors();
        if clamped > 0 {
            tracing::warn!(clamped, "clamped out-of-range standalone anchors");
        }
        for node in &mut self.nodes {
            node.repair_content_seq();
        }
    }

    // ---- media walking ----

    /// Every media reference held by nodes and standalone blocks.
    pub fn media_sites(&self) -> Vec<(MediaSite, &MediaRef)> {
        let mut sites = Vec::new();
        for node in &self.nodes {
            for block in &node.contents {
                if let Some(media) = block.body.media() {
                    let site = MediaSite::Node {
                        node: node.id,
                        content: block.content_id.clone(),
                    };
                    sites.push((site, media));
                }
            }
        }
        for block in &self.standalone {
            if let Some(media) = block.body.media() {
                sites.push((MediaSite::Standalone(block.id.clone()), media));
            }
        }
        sites
    }

    /// Visit every media reference mutably, with its site.
    pub fn for_each_media_mut(&mut self, mut visit: impl FnMut(&MediaSite, &mut MediaRef)) {
        for node in &mut self.nodes {
            let node_id = node.id;
            for block in &mut node.contents {
                let site = MediaSite::Node {
                    node: node_id,
                    content: block.content_id.clone(),
                };
                if let Some(media) = block.body.media_mut() {
                    visit(&site, media);
                }
            }
        }
        for block in &mut self.standalone {
            let site = MediaSite::Standalone(block.id.clone());
            if let Some(media) = block.body.media_mut() {
                visit(&site, media);
            }
        }
    }
}
