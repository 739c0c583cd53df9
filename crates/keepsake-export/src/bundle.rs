//! The data embedded in an artifact.

use chrono::{DateTime, Utc};
use keepsake_model::{Avatar, Document, EndingConfig, MusicConfig, StandaloneBlock, StoryNode};
use keepsake_render::{DisplayTree, PreloadManifest};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

/// Version of the embedded bundle layout.
pub const FORMAT_VERSION: u32 = 2;

/// Fully inlined story content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleContent {
    pub timeline: Vec<StoryNode>,
    pub standalone_blocks: Vec<StandaloneBlock>,
    pub ending: EndingConfig,
    /// Present only when the track is a self-contained literal.
    pub music: Option<MusicConfig>,
    #[serde(default)]
    pub avatars: Vec<Avatar>,
    #[serde(default)]
    pub preload: PreloadManifest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub format_version: u32,
    /// BLAKE3 hex digest of the serialized content.
    pub digest: String,
}

/// Content plus metadata, as written into the artifact's data block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub content: BundleContent,
    pub metadata: ExportMetadata,
}

fn digest_of(content: &BundleContent) -> ExportResult<String> {
    let bytes = serde_json::to_vec(content)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

impl ExportBundle {
    /// Stamp `content` with metadata and its digest.
    pub fn seal(content: BundleContent, exported_at: DateTime<Utc>) -> ExportResult<Self> {
        let digest = digest_of(&content)?;
        Ok(Self {
            content,
            metadata: ExportMetadata {
                exported_at,
                format_version: FORMAT_VERSION,
                digest,
            },
        })
    }

    /// Check the version and recompute the digest.
    pub fn verify(&self) -> ExportResult<()> {
        if self.metadata.format_version != FORMAT_VERSION {
            return Err(ExportError::UnsupportedVersion(self.metadata.format_version));
        }
        let actual = digest_of(&self.content)?;
        if actual != self.metadata.digest {
            return Err(ExportError::DigestMismatch {
                expected: self.metadata.digest.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// The story as a document; default music when none was exported.
    pub fn to_document(&self) -> Document {
        Document {
            nodes: self.content.timeline.clone(),
            standalone: self.content.standalone_blocks.clone(),
            ending: self.content.ending.clone(),
            music: self.content.music.clone().unwrap_or_default(),
        }
    }

    /// Render the bundle the same way the editor renders a document.
    pub fn render(&self) -> DisplayTree {
        keepsake_render::render(&self.to_document())
    }

    /// Download name, `our-story-YYYY-MM-DD.html`.
    pub fn file_name(&self) -> String {
        format!("our-story-{}.html", self.metadata.exported_at.format("%Y-%m-%d"))
    }
}
