//! Foundation types for Keepsake.
//!
//! This crate provides the identifier and reference types shared by every
//! other Keepsake crate. Nothing here touches storage: the types only
//! describe *where* bytes live, never the bytes themselves.
//!
//! # Key Types
//!
//! - [`MediaId`] - Binary object store key (`img_<millis>_<suffix>`)
//! - [`NodeId`] - Stable story node identifier, never reused
//! - [`ContentId`] - Per-node content block identifier, stable across reorders
//! - [`BlockId`] - Standalone block identifier
//! - [`SessionId`] - Identity of one editing session (one process run)
//! - [`MediaRef`] - Tagged union over stored, transient and inline media
//! - [`DataUrl`] - Parsed `data:` literal used for inlined media

pub mod error;
pub mod ids;
pub mod media;

pub use error::TypeError;
pub use ids::{BlockId, ContentId, MediaId, NodeId, SessionId};
pub use media::{estimate_decoded_len, DataUrl, MediaKind, MediaRef, TransientHandle};
