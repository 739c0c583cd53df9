//! Self-contained HTML export for Keepsake.
//!
//! An export deep-copies the story, gathers every media reference that is
//! not already an inline literal, checks the projected size against a hard
//! ceiling, resolves and inlines each item under a per-item timeout, and
//! writes one HTML file holding styles, an embedded JSON data block and a
//! static viewer script. The file opens with no network and no store.
//!
//! A single unresolvable item never aborts an export; it is reported in
//! [`PartialResolution`] and left out.
//!
//! # Modules
//!
//! - [`collect`] - Media collection, size projection and the preload manifest
//! - [`pipeline`] - [`ExportPipeline`] and its options
//! - [`bundle`] - The embedded [`ExportBundle`] and its digest
//! - [`writer`] / [`reader`] - Artifact assembly and extraction
//! - [`assets`] - Bundled styles and viewer script

pub mod assets;
pub mod bundle;
pub mod collect;
pub mod error;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use bundle::{BundleContent, ExportBundle, ExportMetadata, FORMAT_VERSION};
pub use collect::{collect, preload_manifest, projected_size, ExportItem};
pub use error::{ExportError, ExportResult, PartialResolution, SkippedItem};
pub use pipeline::{ExportArtifact, ExportOptions, ExportPipeline, DEFAULT_ITEM_TIMEOUT, DEFAULT_SIZE_BUDGET};
pub use reader::{read_artifact, read_bundle};
pub use writer::ArtifactWriter;
