//! High-level SDK for Keepsake.
//!
//! [`EditorSession`] is the main entry point for applications embedding the
//! editor: it loads (and upgrades) the stored story, applies edits, persists
//! after every change and drives rendering, export and backups.

pub mod backup;
pub mod config;
pub mod error;
pub mod notice;
pub mod session;

pub use backup::Backup;
pub use config::{ExportConfig, KeepsakeConfig, MediaStoreConfig};
pub use error::{SdkError, SdkResult};
pub use notice::{Notice, NoticeLevel};
pub use session::EditorSession;

// Re-export key types
pub use keepsake_docstore::{format_size, DocStoreUsage, UsageLevel};
pub use keepsake_export::{ExportArtifact, PartialResolution};
pub use keepsake_model::{
    BlockBody, BlockField, Direction, Document, EndingField, MoveOutcome, NodeField, SCHEMA_VERSION,
};
pub use keepsake_render::{to_html, DisplayTree, HydrateReport};
pub use keepsake_store::{MediaBlob, StoreUsage};
pub use keepsake_types::{BlockId, ContentId, MediaKind, MediaRef, NodeId};
