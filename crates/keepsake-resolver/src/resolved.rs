use keepsake_store::MediaBlob;
use keepsake_types::{estimate_decoded_len, DataUrl, MediaRef};

/// What a resolved reference yields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedMedia {
    /// Raw bytes from the binary store or the session registry.
    Bytes(MediaBlob),
    /// An inline literal, returned as stored: a `data:` URL or an asset path.
    Literal(String),
}

impl ResolvedMedia {
    /// Approximate payload size in bytes.
    pub fn size_hint(&self) -> u64 {
        match self {
            ResolvedMedia::Bytes(blob) => blob.len() as u64,
            ResolvedMedia::Literal(literal) if literal.starts_with("data:") => {
                estimate_decoded_len(literal.len())
            }
            ResolvedMedia::Literal(_) => 0,
        }
    }

    /// A literal usable directly as a `src` attribute.
    pub fn to_literal(&self) -> String {
        match self {
            ResolvedMedia::Bytes(blob) => DataUrl::new(blob.mime.clone(), blob.bytes.to_vec()).encode(),
            ResolvedMedia::Literal(literal) => literal.clone(),
        }
    }

    /// `true` when [`ResolvedMedia::to_literal`] embeds the bytes.
    pub fn is_self_contained(&self) -> bool {
        match self {
            ResolvedMedia::Bytes(_) => true,
            ResolvedMedia::Literal(literal) => literal.starts_with("data:"),
        }
    }

    /// The reference that replaces the original once this is inlined.
    pub fn into_inline_ref(self) -> MediaRef {
        match self {
            ResolvedMedia::Literal(literal) => MediaRef::Inline(literal),
            bytes => MediaRef::Inline(bytes.to_literal()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_become_data_url() {
        let resolved = ResolvedMedia::Bytes(MediaBlob::new(b"hi".to_vec(), "image/png", "a.png"));
        assert_eq!(resolved.to_literal(), "data:image/png;base64,aGk=");
        assert!(resolved.is_self_contained());
        assert_eq!(resolved.size_hint(), 2);
    }

    #[test]
    fn literal_passes_through() {
        let resolved = ResolvedMedia::Literal("assets/a.jpg".into());
        assert!(!resolved.is_self_contained());
        assert_eq!(resolved.size_hint(), 0);
        assert_eq!(resolved.into_inline_ref(), MediaRef::Inline("assets/a.jpg".into()));
    }
}
