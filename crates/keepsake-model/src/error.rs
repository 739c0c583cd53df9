//! Error types for document model operations.

use keepsake_types::BlockId;
use thiserror::Error;

use crate::block::BlockKind;

/// Errors raised by [`crate::Document`] operations.
///
/// Moving past an edge is not an error; it is reported as
/// [`crate::MoveOutcome::AtBoundary`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("node index {index} out of range (document has {len} nodes)")]
    NodeIndexOutOfRange { index: usize, len: usize },

    #[error("content index {index} out of range (node {node} has {len} blocks)")]
    ContentIndexOutOfRange {
        node: usize,
        index: usize,
        len: usize,
    },

    #[error("standalone block not found: {0}")]
    StandaloneNotFound(BlockId),

    /// The field does not exist on this kind of block, e.g. `alt` on text.
    #[error("field `{field}` does not apply to a {kind} block")]
    FieldNotApplicable { field: &'static str, kind: BlockKind },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Convenience type alias for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
