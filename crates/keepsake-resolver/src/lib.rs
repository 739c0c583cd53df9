//! Media reference resolution for Keepsake.
//!
//! [`ReferenceResolver`] is the only component that knows which tier a piece
//! of media lives in. Writers hand it a [`MediaBlob`](keepsake_store::MediaBlob)
//! and get a [`MediaRef`](keepsake_types::MediaRef) back; readers hand it a
//! reference and get bytes or a literal back. When the binary store is
//! unusable it degrades to session-scoped transient references.
//!
//! # Modules
//!
//! - [`error`] - [`ResolveError`] and the result alias
//! - [`resolved`] - [`ResolvedMedia`], the output of a resolution
//! - [`source`] - The [`MediaSource`] trait consumed by rendering and export
//! - [`resolver`] - The [`ReferenceResolver`] itself

pub mod error;
pub mod resolved;
pub mod resolver;
pub mod source;

pub use error::{ResolveError, ResolveResult};
pub use resolved::ResolvedMedia;
pub use resolver::{Persisted, ReferenceResolver};
pub use source::MediaSource;
