//! Error types for the dropdat-core crate

use crate::key::KeyError;
use thiserror::Error;

/// Result type alias using `ArchiveError`
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised by the archive engine and its collaborators
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Key could not be parsed or had the wrong width
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    /// Path not present in the archive
    #[error("not found: {0}")]
    NotFound(String),

    /// Archive opened by key only; no signing key to write with
    #[error("archive {0} is read-only")]
    ReadOnly(String),

    /// Path escapes the archive root or is otherwise malformed
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Malformed replication frame
    #[error("replication protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
