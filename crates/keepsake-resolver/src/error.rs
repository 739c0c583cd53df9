use keepsake_store::StoreError;
use keepsake_types::{MediaId, TransientHandle};
use thiserror::Error;

/// Why a media reference could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The binary store has no record for this id.
    #[error("media not found: {0}")]
    NotFound(MediaId),

    /// A transient reference outlived the session that created it.
    #[error("stale reference {0}: its session has ended; the media must be re-supplied")]
    StaleReference(TransientHandle),

    /// A bundled asset could not be read.
    #[error("asset unavailable: {path}: {reason}")]
    AssetUnavailable { path: String, reason: String },

    /// Resolution did not settle within the allowed time.
    #[error("timed out after {0} ms")]
    TimedOut(u64),

    /// Any other store failure (unavailable, corrupt record, I/O).
    #[error("store error: {0}")]
    Store(StoreError),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<StoreError> for ResolveError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ResolveError::NotFound(id),
            other => ResolveError::Store(other),
        }
    }
}

/// Result alias for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
