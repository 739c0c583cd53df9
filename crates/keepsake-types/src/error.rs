use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("not a data URL: {0}")]
    NotDataUrl(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}
