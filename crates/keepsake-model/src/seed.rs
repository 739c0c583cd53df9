//! The story shipped with the editor, used on first launch and on reset.
//!
//! Media points at bundled asset paths, which render as-is and are inlined
//! at export time only when an asset root is configured.

use keepsake_types::{MediaRef, NodeId};

use crate::block::BlockBody;
use crate::document::Document;
use crate::node::StoryNode;
use crate::settings::{EndingConfig, MusicConfig};

const IMAGES: &str = "assets/images/placeholder";
const VIDEOS: &str = "assets/videos";

enum SeedMedia {
    Image(&'static str, &'static str),
    Video(&'static str, &'static str),
}

struct SeedNode {
    id: u64,
    date: &'static str,
    title: &'static str,
    text: &'static str,
    media: &'static [SeedMedia],
    highlight: bool,
}

const SEED: &[SeedNode] = &[
    SeedNode {
        id: 1,
        date: "2021.12.01",
        title: "We said hello",
        text: "The story starts here, with a single \"hi\".",
        media: &[SeedMedia::Image("2021-12-01-hello.jpg", "First message")],
        highlight: false,
    },
    SeedNode {
        id: 2,
        date: "2022.03.30",
        title: "Made it official",
        text: "From this day on, it was the two of us.",
        media: &[
            SeedMedia::Image("2022-03-30-certificate.jpg", "Certificate"),
            SeedMedia::Image("2022-03-30-selfie.jpg", "Selfie on the steps"),
        ],
        highlight: true,
    },
    SeedNode {
        id: 3,
        date: "2022.05.02",
        title: "The wedding",
        text: "The day we promised each other everything.",
        media: &[
            SeedMedia::Image("2022-05-02-wedding-1.jpg", "The venue"),
            SeedMedia::Video("wedding.mp4", "2022-05-02-wedding-poster.jpg"),
        ],
        highlight: true,
    },
    SeedNode {
        id: 4,
        date: "2022.09.04",
        title: "Our first trip",
        text: "Dams, gorges and far too many snacks.",
        media: &[
            SeedMedia::Image("2022-09-04-travel-1.jpg", "By the river"),
            SeedMedia::Image("2022-09-04-travel-2.jpg", "The gorge"),
        ],
        highlight: false,
    },
    SeedNode {
        id: 5,
        date: "2023.01.31",
        title: "Welcome, little one",
        text: "Thank you for giving me a whole family.",
        media: &[
            SeedMedia::Image("2023-01-31-baby-1.jpg", "First photo"),
            SeedMedia::Video("baby.mp4", "2023-01-31-baby-poster.jpg"),
        ],
        highlight: true,
    },
    SeedNode {
        id: 6,
        date: "2024.01",
        title: "By the sea",
        text: "Wind, sand and a sunset. Simple happiness.",
        media: &[
            SeedMedia::Image("2024-01-beach-1.jpg", "Silver beach"),
            SeedMedia::Image("2024-01-beach-2.jpg", "Sunset"),
        ],
        highlight: false,
    },
];

fn build_node(seed: &SeedNode) -> StoryNode {
    let mut node = StoryNode {
        id: NodeId::new(seed.id),
        date: seed.date.to_string(),
        title: Some(seed.title.to_string()),
        is_highlight: seed.highlight,
        contents: Vec::new(),
        next_content_seq: 0,
    };
    node.push_block(BlockBody::text(seed.text));
    for media in seed.media {
        let body = match media {
            SeedMedia::Image(file, alt) => {
                BlockBody::image(MediaRef::Inline(format!("{IMAGES}/{file}")), *alt)
            }
            SeedMedia::Video(file, poster) => BlockBody::Video {
                media: MediaRef::Inline(format!("{VIDEOS}/{file}")),
                poster: Some(format!("{IMAGES}/{poster}")),
            },
        };
        node.push_block(body);
    }
    node
}

/// A fresh deep copy of the built-in story.
pub fn clone_default_document() -> Document {
    Document {
        nodes: SEED.iter().map(build_node).collect(),
        standalone: Vec::new(),
        ending: EndingConfig::default(),
        music: MusicConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_are_independent() {
        let mut a = clone_default_document();
        let b = clone_default_document();
        a.nodes[0].title = Some("changed".into());
        assert_ne!(a, b);
        assert_eq!(b, clone_default_document());
    }

    #[test]
    fn seed_holds_no_session_media() {
        let doc = clone_default_document();
        assert!(!doc.nodes.is_empty());
        assert!(doc
            .media_sites()
            .iter()
            .all(|(_, media)| media.is_inline()));
    }

    #[test]
    fn seed_content_ids_are_unique() {
        let doc = clone_default_document();
        let mut ids: Vec<_> = doc
            .nodes
            .iter()
            .flat_map(|n| n.contents.iter().map(|b| b.content_id.clone()))
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
