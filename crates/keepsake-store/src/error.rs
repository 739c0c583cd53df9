use keepsake_types::MediaId;

/// Errors from binary object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("media not found: {0}")]
    NotFound(MediaId),

    /// The backend is not usable in this environment.
    #[error("binary store unavailable: {0}")]
    Unavailable(String),

    /// Checksum mismatch on read (data corruption).
    #[error("checksum mismatch for {id}: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        id: MediaId,
        expected: u32,
        computed: u32,
    },

    /// The record file is malformed or cannot be decoded.
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: MediaId, reason: String },

    /// Could not find a free id after repeated attempts.
    #[error("id space exhausted after {0} attempts")]
    IdCollision(usize),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
