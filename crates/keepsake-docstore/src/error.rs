//! Error types for document store operations.

use thiserror::Error;

/// Errors that can occur while writing to the document store.
///
/// Reads never fail on bad data: a value that does not parse is reported as
/// absent by [`crate::DocumentStoreExt::load`].
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// The write would push the store past its byte ceiling. Nothing was
    /// written; previously saved state is intact.
    #[error("storage full: writing {key} needs {needed} bytes but capacity is {capacity}")]
    QuotaExceeded {
        key: String,
        needed: u64,
        capacity: u64,
    },

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error in the file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience type alias for document store operations.
pub type DocStoreResult<T> = std::result::Result<T, DocStoreError>;
