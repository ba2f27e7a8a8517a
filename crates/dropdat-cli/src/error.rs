//! Error types for sessions and HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dropdat_core::{ArchiveError, ArchiveKey};
use thiserror::Error;

/// Errors that end an upload session abnormally.
///
/// None of these are fatal to the gateway; they are logged and the session
/// is dropped.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Reading the key handshake failed
    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// Archive engine could not open the archive
    #[error("archive {key} could not be opened: {source}")]
    Archive {
        key: ArchiveKey,
        #[source]
        source: ArchiveError,
    },

    /// Transport or replication stream failed mid-relay
    #[error("relay for {key} failed: {source}")]
    Relay {
        key: ArchiveKey,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by the per-archive HTTP handler
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl ApiError {
    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Archive(ArchiveError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Archive(ArchiveError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            Self::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            [("Content-Type", "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ArchiveError::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ArchiveError::InvalidPath("..".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ArchiveError::Protocol("bad".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
