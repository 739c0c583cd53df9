//! Binary object store for Keepsake media.
//!
//! Images (and any other binary payload the editor wants to keep across
//! sessions) live here, addressed by generated [`MediaId`]s. The structured
//! document store only ever holds references into this store, never bytes.
//!
//! # Storage Backends
//!
//! All backends implement the async [`BinaryObjectStore`] trait:
//!
//! - [`InMemoryBinaryStore`] -- `HashMap`-based store for tests and embedding;
//!   can be switched to "unavailable" to exercise degraded mode
//! - [`FsBinaryStore`] -- one checksummed record file per object in a directory
//!
//! # Design Rules
//!
//! 1. Ids are generated by the store and never collide, even under rapid
//!    concurrent `put` calls.
//! 2. `delete` is idempotent: deleting a missing id is `Ok(false)`.
//! 3. An unavailable store is not fatal; callers probe
//!    [`BinaryObjectStore::is_available`] and degrade to transient references.
//! 4. `clear` is only ever called on explicit user request.
//!
//! [`MediaId`]: keepsake_types::MediaId

pub mod error;
pub mod fs;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBinaryStore;
pub use memory::InMemoryBinaryStore;
pub use record::{MediaBlob, MediaMeta, MediaRecord, StoreUsage};
pub use traits::BinaryObjectStore;
