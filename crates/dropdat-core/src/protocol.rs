//! Gateway wire protocol constants
//!
//! A session starts with the raw 32-byte archive key; every byte after it,
//! in both directions, belongs to the replication stream.

use std::io;

/// Width of the handshake: the raw archive key
pub const HANDSHAKE_LEN: usize = crate::KEY_LEN;

/// Default port for upload sessions
pub const DEFAULT_UPLOAD_PORT: u16 = 8041;

/// Default port for the HTTP surface
pub const DEFAULT_HTTP_PORT: u16 = 8040;

/// `Upgrade` token for sessions tunnelled through the HTTP listener
pub const UPGRADE_PROTOCOL: &str = "drop-dat";

/// Path accepting upgraded upload sessions
pub const UPGRADE_PATH: &str = "/upload";

/// Whether an IO error just means the peer went away mid-stream.
/// Such errors end a session normally.
pub fn is_early_close(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_close_kinds() {
        for kind in [
            io::ErrorKind::UnexpectedEof,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
        ] {
            assert!(is_early_close(&io::Error::from(kind)), "{:?}", kind);
        }
        assert!(!is_early_close(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_early_close(&io::Error::other("boom")));
        assert!(!is_early_close(&io::Error::from(io::ErrorKind::InvalidData)));
    }
}
