//! Client error types

use dropdat_core::ArchiveError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Gateway could not be reached
    #[error("Connection error: failed to connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered the upgrade request with something other than 101
    #[error("Upgrade refused: {0}")]
    UpgradeRefused(String),

    /// Archive engine error
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Check if the gateway could not be reached at all
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
