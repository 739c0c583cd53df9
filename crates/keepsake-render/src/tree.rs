//! The display tree and the pure render pass.

use keepsake_model::{
    BlockBody, BlockKind, Document, EndingConfig, MediaSite, StandaloneBlock, StoryNode,
};
use keepsake_types::{BlockId, MediaRef, NodeId};
use serde::Serialize;

/// A media slot in the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MediaSlot {
    /// Ready to show: a `data:` URL or an asset path.
    Ready { src: String },
    /// Waiting on a store lookup; shown as a loading placeholder.
    Pending {
        #[serde(skip)]
        media: MediaRef,
    },
    /// The lookup failed; shown as a distinct "failed to load" placeholder.
    Failed { reason: String },
}

impl MediaSlot {
    fn for_ref(media: &MediaRef) -> Self {
        match media {
            MediaRef::Inline(literal) => MediaSlot::Ready {
                src: literal.clone(),
            },
            other => MediaSlot::Pending {
                media: other.clone(),
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MediaSlot::Pending { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, MediaSlot::Ready { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockContent {
    Text {
        content: String,
    },
    Image {
        slot: MediaSlot,
        alt: String,
        caption: Option<String>,
    },
    Video {
        slot: MediaSlot,
        poster: Option<String>,
    },
}

impl BlockContent {
    pub fn slot(&self) -> Option<&MediaSlot> {
        match self {
            BlockContent::Text { .. } => None,
            BlockContent::Image { slot, .. } | BlockContent::Video { slot, .. } => Some(slot),
        }
    }

    pub fn slot_mut(&mut self) -> Option<&mut MediaSlot> {
        match self {
            BlockContent::Text { .. } => None,
            BlockContent::Image { slot, .. } | BlockContent::Video { slot, .. } => Some(slot),
        }
    }
}

/// One rendered block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockView {
    /// Stable key, equal to the preload-manifest key of the block's media.
    pub key: String,
    pub kind: BlockKind,
    pub content: BlockContent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub index: usize,
    pub date: String,
    pub title: Option<String>,
    pub is_highlight: bool,
    pub blocks: Vec<BlockView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum DisplayItem {
    Node(NodeView),
    Standalone { id: BlockId, block: BlockView },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndingView {
    pub message: String,
    pub signature: String,
    pub name: String,
    pub date: String,
}

impl From<&EndingConfig> for EndingView {
    fn from(ending: &EndingConfig) -> Self {
        Self {
            message: ending.message.clone(),
            signature: ending.signature.clone(),
            name: ending.name.clone(),
            date: ending.date.clone(),
        }
    }
}

/// The rendered page: items in display order, then the ending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayTree {
    pub items: Vec<DisplayItem>,
    pub ending: EndingView,
}

impl DisplayTree {
    /// Every media slot with its block key.
    pub fn slots(&self) -> impl Iterator<Item = (&str, &MediaSlot)> {
        self.blocks()
            .filter_map(|block| block.content.slot().map(|slot| (block.key.as_str(), slot)))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BlockView> {
        self.items.iter().flat_map(|item| match item {
            DisplayItem::Node(node) => node.blocks.iter().collect::<Vec<_>>(),
            DisplayItem::Standalone { block, .. } => vec![block],
        })
    }

    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut BlockView> {
        self.blocks_mut().into_iter().nth(index)
    }

    pub(crate) fn blocks_mut(&mut self) -> Vec<&mut BlockView> {
        let mut out = Vec::new();
        for item in &mut self.items {
            match item {
                DisplayItem::Node(node) => out.extend(node.blocks.iter_mut()),
                DisplayItem::Standalone { block, .. } => out.push(block),
            }
        }
        out
    }

    pub fn pending_count(&self) -> usize {
        self.slots().filter(|(_, slot)| slot.is_pending()).count()
    }
}

/// Identity of an item in render order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderKey {
    Node(NodeId),
    Standalone(BlockId),
}

/// The merged sequence: blocks anchored at `-1`, then each node followed by
/// the blocks anchored after it. Same-anchor blocks keep insertion order.
pub fn render_order(document: &Document) -> Vec<RenderKey> {
    let mut order: Vec<RenderKey> = document
        .standalone_at(-1)
        .map(|b| RenderKey::Standalone(b.id.clone()))
        .collect();
    for (index, node) in document.nodes.iter().enumerate() {
        order.push(RenderKey::Node(node.id));
        order.extend(
            document
                .standalone_at(index as i64)
                .map(|b| RenderKey::Standalone(b.id.clone())),
        );
    }
    order
}

fn block_view(key: String, body: &BlockBody) -> BlockView {
    let content = match body {
        BlockBody::Text { content } => BlockContent::Text {
            content: content.clone(),
        },
        BlockBody::Image {
            media,
            alt,
            caption,
        } => BlockContent::Image {
            slot: MediaSlot::for_ref(media),
            alt: alt.clone(),
            caption: caption.clone(),
        },
        BlockBody::Video { media, poster } => BlockContent::Video {
            slot: MediaSlot::for_ref(media),
            poster: poster.clone(),
        },
    };
    BlockView {
        key,
        kind: body.kind(),
        content,
    }
}

fn node_view(index: usize, node: &StoryNode) -> NodeView {
    NodeView {
        id: node.id,
        index,
        date: node.date.clone(),
        title: node.title.clone(),
        is_highlight: node.is_highlight,
        blocks: node
            .contents
            .iter()
            .map(|block| {
                let site = MediaSite::Node {
                    node: node.id,
                    content: block.content_id.clone(),
                };
                block_view(site.preload_key(), &block.body)
            })
            .collect(),
    }
}

fn standalone_item(block: &StandaloneBlock) -> DisplayItem {
    let key = MediaSite::Standalone(block.id.clone()).preload_key();
    DisplayItem::Standalone {
        id: block.id.clone(),
        block: block_view(key, &block.body),
    }
}

/// Project `document` to a display tree. Never touches a store.
///
/// Walks the same sequence as [`render_order`].
pub fn render(document: &Document) -> DisplayTree {
    let mut items: Vec<DisplayItem> = document.standalone_at(-1).map(standalone_item).collect();
    for (index, node) in document.nodes.iter().enumerate() {
        items.push(DisplayItem::Node(node_view(index, node)));
        items.extend(document.standalone_at(index as i64).map(standalone_item));
    }
    DisplayTree {
        items,
        ending: EndingView::from(&document.ending),
    }
}
