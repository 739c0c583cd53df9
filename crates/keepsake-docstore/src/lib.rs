//! Structured document store for Keepsake.
//!
//! A synchronous key to JSON-text store with a fixed byte ceiling, holding
//! the story document, ending and music settings and a handful of flags.
//! Binary media never lands here; documents carry only media references.
//!
//! # Modules
//!
//! - [`error`] - Error types for store operations
//! - [`keys`] - The well-known [`StoreKey`] names
//! - [`traits`] - The [`DocumentStore`] trait and typed [`DocumentStoreExt`] helpers
//! - [`usage`] - Capacity accounting and [`UsageLevel`] thresholds
//! - [`memory`] - In-memory [`InMemoryDocumentStore`] for tests
//! - [`file`] - [`JsonFileDocumentStore`], a single JSON file on disk

pub mod error;
pub mod file;
pub mod keys;
pub mod memory;
pub mod traits;
pub mod usage;

pub use error::{DocStoreError, DocStoreResult};
pub use file::JsonFileDocumentStore;
pub use keys::StoreKey;
pub use memory::InMemoryDocumentStore;
pub use traits::{DocumentStore, DocumentStoreExt};
pub use usage::{format_size, DocStoreUsage, UsageLevel, DEFAULT_CAPACITY};
