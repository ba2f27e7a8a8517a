//! Archive engine contract
//!
//! The gateway and the client only ever talk to archives through these
//! traits. Everything is opaque to them: they open archives by key, hand
//! out replication byte streams, and mount read access over HTTP.

use crate::{ArchiveError, ArchiveKey, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Any duplex byte stream usable for replication
pub trait ReplicationIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ReplicationIo for T {}

/// Replication byte stream handed out by an archive
pub type ReplicationStream = Box<dyn ReplicationIo>;

/// Shared handle to an open archive
pub type ArchiveRef = Arc<dyn Archive>;

/// Options for opening an existing archive by key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Content is not fetched up front; it arrives on demand over replication
    pub sparse: bool,
}

impl OpenOptions {
    /// Options used by the gateway: fetch on demand
    pub fn sparse() -> Self {
        Self { sparse: true }
    }
}

/// Which directions a replication stream carries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicateOptions {
    /// Send local content to the remote side
    pub upload: bool,
    /// Accept content from the remote side
    pub download: bool,
    /// Keep the stream open and forward later writes
    pub live: bool,
}

impl ReplicateOptions {
    /// Receive only
    pub fn download() -> Self {
        Self {
            download: true,
            ..Default::default()
        }
    }

    /// Send only
    pub fn upload() -> Self {
        Self {
            upload: true,
            ..Default::default()
        }
    }

    /// Keep forwarding writes after the initial snapshot
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }
}

/// Kind of an archive entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File { size: u64 },
    Directory,
}

/// Immediate child of an archive directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// An open archive
#[async_trait]
pub trait Archive: Send + Sync {
    /// Public key of this archive
    fn key(&self) -> ArchiveKey;

    /// Whether this copy holds the signing key
    fn is_writable(&self) -> bool;

    /// Whether content is fetched on demand
    fn is_sparse(&self) -> bool;

    /// Number of writes applied so far
    fn version(&self) -> u64;

    /// Write a file at `path`
    async fn write_file(&self, path: &str, data: Bytes) -> Result<()>;

    /// Read the file at `path`
    async fn read_file(&self, path: &str) -> Result<Bytes>;

    /// Describe the entry at `path`
    async fn stat(&self, path: &str) -> Result<EntryKind>;

    /// List immediate children of the directory at `path`
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Open a replication stream
    fn replicate(&self, options: ReplicateOptions) -> ReplicationStream;
}

/// Creates and opens archives
#[async_trait]
pub trait ArchiveEngine: Send + Sync + 'static {
    /// Create a new writable archive under a fresh key
    async fn create(&self) -> Result<ArchiveRef>;

    /// Open an archive by key. Resolves once the archive is ready.
    async fn open(&self, key: ArchiveKey, options: OpenOptions) -> Result<ArchiveRef>;
}

/// Normalise an archive path: no leading slash, no empty or `.` segments.
/// The archive root is the empty string.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(ArchiveError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/").unwrap(), "");
        assert_eq!(normalize_path("").unwrap(), "");
        assert_eq!(normalize_path("/a//b/./c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(normalize_path("dir\\file").unwrap(), "dir/file");
        assert!(matches!(
            normalize_path("/a/../etc/passwd"),
            Err(ArchiveError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_replicate_options() {
        let opts = ReplicateOptions::upload().live();
        assert!(opts.upload && opts.live && !opts.download);
        assert_eq!(ReplicateOptions::download().download, true);
    }
}
