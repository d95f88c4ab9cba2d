//! Error types for dissimilarity matrices, reduction stages and exporters.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for all fallible operations of this crate
pub type Result<T> = std::result::Result<T, DimredError>;

/// Errors raised while configuring or running a reduction pipeline
#[derive(Debug, Error)]
pub enum DimredError {
    /// Malformed or contradictory setup, detected before any computation runs
    #[error("invalid configuration in {context}: {reason}")]
    InvalidConfiguration { context: String, reason: String },

    /// An operation was queried before its prerequisite state was reached
    #[error("invalid state in {context}: {reason}")]
    InvalidState { context: String, reason: String },

    /// A point index outside `0..len`
    #[error("index {index} out of range for {len} points in {context}")]
    IndexOutOfRange {
        context: String,
        index: usize,
        len: usize,
    },

    /// Export destination could not be opened or written
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pluggable embedding algorithm failed or broke its output contract
    #[error("embedding failed in stage {stage}: {source}")]
    Embedding {
        stage: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DimredError {
    pub fn invalid_configuration(context: impl Into<String>, reason: impl Into<String>) -> Self {
        DimredError::InvalidConfiguration {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_state(context: impl Into<String>, reason: impl Into<String>) -> Self {
        DimredError::InvalidState {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DimredError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fails with [`DimredError::IndexOutOfRange`] unless `index < len`.
pub(crate) fn check_index(context: &str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(DimredError::IndexOutOfRange {
            context: context.to_string(),
            index,
            len,
        })
    }
}
