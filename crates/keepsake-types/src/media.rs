use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{MediaId, SessionId};

/// Handle to bytes held only in the memory of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransientHandle {
    pub session: SessionId,
    pub seq: u64,
}

impl TransientHandle {
    pub fn new(session: SessionId, seq: u64) -> Self {
        Self { session, seq }
    }

    /// A handle that can never be resolved.
    pub fn stale() -> Self {
        Self {
            session: SessionId::nil(),
            seq: 0,
        }
    }
}

impl fmt::Display for TransientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:{}/{}", self.session.short_id(), self.seq)
    }
}

/// Where the bytes of a piece of media live.
///
/// Serialized externally tagged, e.g. `{"stored":"img_1700000000000_k3j9a0b1c"}`.
/// This is decoded once when a document is loaded; nothing downstream parses
/// string prefixes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaRef {
    /// Durable record in the binary object store.
    Stored(MediaId),
    /// Session-scoped bytes; lost when the session ends.
    Transient(TransientHandle),
    /// Literal data: a `data:` URL or a bundled asset path.
    Inline(String),
}

impl MediaRef {
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// `true` for an inline literal that embeds its bytes (a `data:` URL).
    pub fn is_self_contained(&self) -> bool {
        match self {
            Self::Inline(literal) => literal.starts_with("data:"),
            Self::Stored(_) | Self::Transient(_) => false,
        }
    }

    /// Decode a legacy prefix-encoded `src` string.
    ///
    /// `indexeddb:<id>` becomes [`MediaRef::Stored`], `blob:` URLs become a
    /// stale transient handle (the session that minted them is gone), and
    /// anything else is kept as an inline literal. Empty strings decode to
    /// `None`.
    pub fn from_legacy_src(src: &str) -> Option<Self> {
        let src = src.trim();
        if src.is_empty() {
            return None;
        }
        if let Some(id) = src.strip_prefix("indexeddb:") {
            return MediaId::parse(id).ok().map(Self::Stored);
        }
        if src.starts_with("blob:") {
            return Some(Self::Transient(TransientHandle::stale()));
        }
        Some(Self::Inline(src.to_string()))
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(id) => write!(f, "stored:{id}"),
            Self::Transient(handle) => write!(f, "{handle}"),
            Self::Inline(literal) if literal.len() > 48 => {
                let head: String = literal.chars().take(48).collect();
                write!(f, "inline:{head}...")
            }
            Self::Inline(literal) => write!(f, "inline:{literal}"),
        }
    }
}

/// Broad media category derived from a MIME type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }

    /// Guess a MIME type from a file name extension.
    pub fn guess_mime(name: &str) -> &'static str {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "avif" => "image/avif",
            "svg" => "image/svg+xml",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "mov" => "video/quicktime",
            "mp3" => "audio/mpeg",
            "ogg" => "audio/ogg",
            "wav" => "audio/wav",
            "m4a" => "audio/mp4",
            _ => "application/octet-stream",
        }
    }
}

/// A parsed base64 `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Parse `data:<mime>;base64,<payload>`.
    pub fn parse(literal: &str) -> Result<Self, TypeError> {
        let rest = literal
            .strip_prefix("data:")
            .ok_or_else(|| TypeError::NotDataUrl(truncate(literal)))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| TypeError::NotDataUrl(truncate(literal)))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| TypeError::NotDataUrl(truncate(literal)))?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| TypeError::InvalidBase64(e.to_string()))?;
        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        Ok(Self::new(mime, bytes))
    }

    /// Encode back to a `data:` literal.
    pub fn encode(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Estimate the decoded size of an encoded literal of `literal_len` bytes.
///
/// Base64 carries three payload bytes per four characters.
pub fn estimate_decoded_len(literal_len: usize) -> u64 {
    (literal_len as u64).saturating_mul(3) / 4
}

fn truncate(literal: &str) -> String {
    literal.chars().take(32).collect()
}
