//! Content blocks: the typed units inside a node or between nodes.

use std::fmt;

use keepsake_types::{BlockId, ContentId, MediaRef};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// The three kinds of block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
    Video,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
        })
    }
}

/// What a block shows. Serialized with a `type` tag:
/// `{"type":"image","media":{...},"alt":"..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockBody {
    Text {
        content: String,
    },
    Image {
        media: MediaRef,
        #[serde(default)]
        alt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Video {
        media: MediaRef,
        /// Poster frame, as a literal (asset path or `data:` URL).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        poster: Option<String>,
    },
}

impl BlockBody {
    pub fn text(content: impl Into<String>) -> Self {
        BlockBody::Text {
            content: content.into(),
        }
    }

    pub fn image(media: MediaRef, alt: impl Into<String>) -> Self {
        BlockBody::Image {
            media,
            alt: alt.into(),
            caption: None,
        }
    }

    pub fn video(media: MediaRef) -> Self {
        BlockBody::Video {
            media,
            poster: None,
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockBody::Text { .. } => BlockKind::Text,
            BlockBody::Image { .. } => BlockKind::Image,
            BlockBody::Video { .. } => BlockKind::Video,
        }
    }

    pub fn media(&self) -> Option<&MediaRef> {
        match self {
            BlockBody::Text { .. } => None,
            BlockBody::Image { media, .. } | BlockBody::Video { media, .. } => Some(media),
        }
    }

    pub fn media_mut(&mut self) -> Option<&mut MediaRef> {
        match self {
            BlockBody::Text { .. } => None,
            BlockBody::Image { media, .. } | BlockBody::Video { media, .. } => Some(media),
        }
    }

    /// Swap in new media and return the old reference.
    pub fn replace_media(&mut self, new: MediaRef) -> ModelResult<MediaRef> {
        let kind = self.kind();
        let slot = self.media_mut().ok_or(ModelError::FieldNotApplicable {
            field: "media",
            kind,
        })?;
        Ok(std::mem::replace(slot, new))
    }

    /// Apply a field update, rejecting fields this kind does not have.
    pub fn apply(&mut self, field: BlockField) -> ModelResult<()> {
        let kind = self.kind();
        let name = field.name();
        match (self, field) {
            (BlockBody::Text { content }, BlockField::Content(value)) => *content = value,
            (BlockBody::Image { alt, .. }, BlockField::Alt(value)) => *alt = value,
            (BlockBody::Image { caption, .. }, BlockField::Caption(value)) => *caption = value,
            (BlockBody::Video { poster, .. }, BlockField::Poster(value)) => *poster = value,
            _ => return Err(ModelError::FieldNotApplicable { field: name, kind }),
        }
        Ok(())
    }
}

/// A single editable field of a block, carrying its new value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockField {
    Content(String),
    Alt(String),
    Caption(Option<String>),
    Poster(Option<String>),
}

impl BlockField {
    /// Build from a field name and a raw string value. Empty strings clear
    /// optional fields.
    pub fn parse(name: &str, value: &str) -> ModelResult<Self> {
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match name {
            "content" => Ok(BlockField::Content(value.to_string())),
            "alt" => Ok(BlockField::Alt(value.to_string())),
            "caption" => Ok(BlockField::Caption(optional())),
            "poster" => Ok(BlockField::Poster(optional())),
            other => Err(ModelError::UnknownField(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlockField::Content(_) => "content",
            BlockField::Alt(_) => "alt",
            BlockField::Caption(_) => "caption",
            BlockField::Poster(_) => "poster",
        }
    }
}

/// A block owned by a story node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    /// Assigned once at creation; never recomputed from position.
    pub content_id: ContentId,
    #[serde(flatten)]
    pub body: BlockBody,
}

/// A block placed between nodes rather than inside one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneBlock {
    pub id: BlockId,
    /// `-1` is before the first node; `n` is right after node `n`.
    pub insert_after: i64,
    #[serde(flatten)]
    pub body: BlockBody,
}

#[cfg(test)]
mod tests {
    use keepsake_types::{MediaId, NodeId};

    use super::*;

    fn stored() -> MediaRef {
        MediaRef::Stored(MediaId::parse("img_1_abc").unwrap())
    }

    #[test]
    fn content_block_json_shape() {
        let block = ContentBlock {
            content_id: ContentId::derive(NodeId::new(7), 0),
            body: BlockBody::image(stored(), "sunset"),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["contentId"], "c_7_0");
        assert_eq!(json["type"], "image");
        assert_eq!(json["alt"], "sunset");
        assert_eq!(json["media"]["stored"], "img_1_abc");
        assert!(json.get("caption").is_none());

        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn standalone_block_json_shape() {
        let block = StandaloneBlock {
            id: BlockId::parse("standalone_1_x").unwrap(),
            insert_after: -1,
            body: BlockBody::text("hello"),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["insertAfter"], -1);
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn apply_rejects_foreign_fields() {
        let mut text = BlockBody::text("a");
        let err = text.apply(BlockField::Alt("x".into())).unwrap_err();
        assert_eq!(
            err,
            ModelError::FieldNotApplicable {
                field: "alt",
                kind: BlockKind::Text
            }
        );
        assert_eq!(text, BlockBody::text("a"));
    }

    #[test]
    fn apply_updates_matching_field() {
        let mut image = BlockBody::image(stored(), "");
        image.apply(BlockField::Caption(Some("Us".into()))).unwrap();
        match image {
            BlockBody::Image { caption, .. } => assert_eq!(caption.as_deref(), Some("Us")),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn parse_field_clears_optional_on_empty() {
        assert_eq!(BlockField::parse("poster", "").unwrap(), BlockField::Poster(None));
        assert!(matches!(
            BlockField::parse("colour", "red"),
            Err(ModelError::UnknownField(_))
        ));
    }

    #[test]
    fn replace_media_returns_previous() {
        let mut video = BlockBody::video(stored());
        let old = video.replace_media(MediaRef::Inline("assets/v.mp4".into())).unwrap();
        assert_eq!(old, stored());
        assert!(BlockBody::text("t").replace_media(stored()).is_err());
    }
}
