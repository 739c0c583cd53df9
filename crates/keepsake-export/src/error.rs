use std::fmt;

use keepsake_model::MediaSite;
use thiserror::Error;

/// Failures that abort an export. Per-item resolution failures are not
/// errors; they are collected in [`PartialResolution`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// Projected artifact size is over the hard ceiling. Raised before any
    /// media is resolved.
    #[error(
        "export would be about {projected_mb:.1} MB, over the {budget_mb:.0} MB limit; \
         remove some large photos or videos and try again"
    )]
    SizeBudgetExceeded {
        projected: u64,
        budget: u64,
        projected_mb: f64,
        budget_mb: f64,
    },

    #[error("stylesheet processing failed: {0}")]
    Stylesheet(String),

    #[error("embedded data block not found in artifact")]
    MissingDataBlock,

    #[error("bundle digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("unsupported bundle format version: {0}")]
    UnsupportedVersion(u32),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn over_budget(projected: u64, budget: u64) -> Self {
        const MB: f64 = 1024.0 * 1024.0;
        ExportError::SizeBudgetExceeded {
            projected,
            budget,
            projected_mb: projected as f64 / MB,
            budget_mb: budget as f64 / MB,
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Serialization(e.to_string())
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

/// One media item that could not be inlined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedItem {
    /// Display form of the reference.
    pub media: String,
    /// Every place in the story that uses it.
    pub sites: Vec<MediaSite>,
    pub reason: String,
}

/// Aggregate of per-item failures from a completed export.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialResolution {
    pub skipped: Vec<SkippedItem>,
}

impl PartialResolution {
    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn len(&self) -> usize {
        self.skipped.len()
    }
}

impl fmt::Display for PartialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} media item(s) could not be included", self.skipped.len())?;
        for item in &self.skipped {
            write!(f, "\n  {}: {}", item.media, item.reason)?;
        }
        Ok(())
    }
}
