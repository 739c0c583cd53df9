//! The Keepsake story document.
//!
//! A [`Document`] is an ordered list of [`StoryNode`]s, each holding an
//! ordered list of typed [`ContentBlock`]s, plus [`StandaloneBlock`]s that
//! are anchored between nodes, plus the ending and music settings.
//!
//! Every operation here is a pure in-memory transform. Persisting the result
//! and re-rendering are the caller's job (see `keepsake-sdk`). Documents
//! only ever hold [`MediaRef`](keepsake_types::MediaRef) tokens, never media
//! bytes.
//!
//! # Modules
//!
//! - [`block`] - Content block sum type and block-level field updates
//! - [`node`] - [`StoryNode`] and node field updates
//! - [`settings`] - [`EndingConfig`], [`MusicConfig`] and the avatar roster
//! - [`document`] - [`Document`] and all editing operations
//! - [`seed`] - The built-in default story
//! - [`legacy`] - One-time upgrade from the schema v1 document shape

pub mod block;
pub mod document;
pub mod error;
pub mod legacy;
pub mod node;
pub mod seed;
pub mod settings;

pub use block::{BlockBody, BlockField, BlockKind, ContentBlock, StandaloneBlock};
pub use document::{Direction, Document, MediaSite, MoveOutcome};
pub use error::{ModelError, ModelResult};
pub use legacy::{upgrade_timeline, SCHEMA_VERSION};
pub use node::{NodeField, StoryNode};
pub use seed::clone_default_document;
pub use settings::{Avatar, AvatarRoster, EndingConfig, EndingField, ImageOffset, MusicConfig};
