//! Error types shared by every stage of the traversal.

use std::io;
use thiserror::Error;

/// Errors that can occur while loading inputs or traversing reads.
///
/// Every variant is fatal to the traversal (or shard) that produced it.
/// A position with zero coverage is never reported through this type.
#[derive(Error, Debug)]
pub enum PileupError {
    #[error("Input unavailable: {0}")]
    InputUnavailable(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Inconsistent alignment in read '{read}': {message}")]
    InconsistentAlignment { read: String, message: String },

    #[error("Unsorted input: {0}")]
    UnsortedInput(String),

    #[error("Unknown contig: '{0}'")]
    UnknownContig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PileupError {
    /// Build an `InconsistentAlignment` error for the named read.
    pub fn inconsistent(read: &str, message: impl Into<String>) -> Self {
        PileupError::InconsistentAlignment {
            read: read.to_string(),
            message: message.into(),
        }
    }

    /// True for errors caused by the read source itself rather than the data in it.
    pub fn is_input_failure(&self) -> bool {
        matches!(
            self,
            PileupError::InputUnavailable(_) | PileupError::Parse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PileupError>;
