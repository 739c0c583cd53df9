//! Rendering for Keepsake.
//!
//! [`render`] is a pure, synchronous projection from a
//! [`Document`](keepsake_model::Document) to a [`DisplayTree`]. Media that
//! needs a store lookup comes out as a [`MediaSlot::Pending`] placeholder;
//! [`hydrate`] later resolves those slots concurrently and swaps in content
//! or a failure placeholder, one slot at a time, in whatever order the
//! lookups settle. [`to_html`] turns a tree into markup.
//!
//! The tree is fully deterministic. Cosmetic randomness (floating hearts,
//! entrance jitter) lives only in the static viewer script.

pub mod html;
pub mod hydrate;
pub mod preload;
pub mod tree;

pub use html::{escape_html, to_html};
pub use hydrate::{hydrate, hydrate_within, HydrateReport};
pub use preload::PreloadManifest;
pub use tree::{
    render, render_order, BlockContent, BlockView, DisplayItem, DisplayTree, EndingView, MediaSlot,
    NodeView, RenderKey,
};
