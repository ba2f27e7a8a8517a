//! In-memory archive engine
//!
//! Every archive lives in process memory and disappears with its last
//! handle. This is the storage the `drop-dat` binary uses both for the
//! uploading side and for the gateway's sparse copies.

use crate::archive::{normalize_path, DirEntry, EntryKind};
use crate::{
    replication, Archive, ArchiveEngine, ArchiveError, ArchiveKey, ArchiveRef, OpenOptions,
    ReplicateOptions, ReplicationStream, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::SigningKey;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered writes kept for live replication subscribers
const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Engine creating [`MemoryArchive`]s
#[derive(Clone, Debug, Default)]
pub struct MemoryEngine;

impl MemoryEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveEngine for MemoryEngine {
    async fn create(&self) -> Result<ArchiveRef> {
        Ok(Arc::new(MemoryArchive::create()))
    }

    async fn open(&self, key: ArchiveKey, options: OpenOptions) -> Result<ArchiveRef> {
        Ok(Arc::new(MemoryArchive::open(key, options)))
    }
}

/// A single file update, as carried by live replication
pub type FileUpdate = (String, Bytes);

struct Inner {
    key: ArchiveKey,
    signing_key: Option<SigningKey>,
    sparse: bool,
    files: RwLock<BTreeMap<String, Bytes>>,
    version: AtomicU64,
    updates: broadcast::Sender<FileUpdate>,
}

/// An archive held entirely in memory
#[derive(Clone)]
pub struct MemoryArchive {
    inner: Arc<Inner>,
}

impl MemoryArchive {
    /// Create a new writable archive under a fresh key
    pub fn create() -> Self {
        let (key, signing_key) = ArchiveKey::generate();
        Self::build(key, Some(signing_key), false)
    }

    /// Open a read-only copy of an archive by key
    pub fn open(key: ArchiveKey, options: OpenOptions) -> Self {
        Self::build(key, None, options.sparse)
    }

    fn build(key: ArchiveKey, signing_key: Option<SigningKey>, sparse: bool) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                key,
                signing_key,
                sparse,
                files: RwLock::new(BTreeMap::new()),
                version: AtomicU64::new(0),
                updates,
            }),
        }
    }

    /// Number of files stored
    pub fn len(&self) -> usize {
        self.inner.files.read().len()
    }

    /// Check if the archive holds no files
    pub fn is_empty(&self) -> bool {
        self.inner.files.read().is_empty()
    }

    /// Snapshot of every file, in path order
    pub(crate) fn snapshot(&self) -> Vec<FileUpdate> {
        self.inner
            .files
            .read()
            .iter()
            .map(|(path, data)| (path.clone(), data.clone()))
            .collect()
    }

    /// Subscribe to writes made after this call
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<FileUpdate> {
        self.inner.updates.subscribe()
    }

    /// Store a file without the writability check; used when applying
    /// content received over replication
    pub(crate) fn apply(&self, path: &str, data: Bytes) -> Result<()> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(ArchiveError::InvalidPath("/".to_string()));
        }
        self.inner.files.write().insert(path.clone(), data.clone());
        self.inner.version.fetch_add(1, Ordering::SeqCst);
        // No receivers is fine: nobody is live-replicating right now.
        let _ = self.inner.updates.send((path, data));
        Ok(())
    }
}

#[async_trait]
impl Archive for MemoryArchive {
    fn key(&self) -> ArchiveKey {
        self.inner.key
    }

    fn is_writable(&self) -> bool {
        self.inner.signing_key.is_some()
    }

    fn is_sparse(&self) -> bool {
        self.inner.sparse
    }

    fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    async fn write_file(&self, path: &str, data: Bytes) -> Result<()> {
        if !self.is_writable() {
            return Err(ArchiveError::ReadOnly(self.inner.key.to_hex()));
        }
        debug!(key = %self.inner.key, path = %path, size = data.len(), "writing file");
        self.apply(path, data)
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let path = normalize_path(path)?;
        self.inner
            .files
            .read()
            .get(&path)
            .cloned()
            .ok_or(ArchiveError::NotFound(path))
    }

    async fn stat(&self, path: &str) -> Result<EntryKind> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Ok(EntryKind::Directory);
        }

        let files = self.inner.files.read();
        if let Some(data) = files.get(&path) {
            return Ok(EntryKind::File {
                size: data.len() as u64,
            });
        }

        let prefix = format!("{}/", path);
        if files.range(prefix.clone()..).next().is_some_and(|(k, _)| k.starts_with(&prefix)) {
            Ok(EntryKind::Directory)
        } else {
            Err(ArchiveError::NotFound(path))
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = normalize_path(path)?;
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        let files = self.inner.files.read();
        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
        for (name, data) in files.range(prefix.clone()..) {
            let Some(rest) = name.strip_prefix(&prefix) else {
                break;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(dir.to_string(), EntryKind::Directory);
                }
                None => {
                    children.insert(
                        rest.to_string(),
                        EntryKind::File {
                            size: data.len() as u64,
                        },
                    );
                }
            }
        }

        if children.is_empty() && !path.is_empty() {
            return Err(ArchiveError::NotFound(path));
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| DirEntry { name, kind })
            .collect())
    }

    fn replicate(&self, options: ReplicateOptions) -> ReplicationStream {
        replication::spawn(self.clone(), options)
    }
}
