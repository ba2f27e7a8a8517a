//! # drop-dat core
//!
//! Building blocks shared by the gateway and the uploading client.
//!
//! This crate provides:
//! - **Archive keys**: 32-byte public keys and their 64-char hex form
//! - **Endpoints**: flexible `host[:port]` resolution for `--serve`/`--upload`
//! - **Archive engine**: the contract the gateway relies on, plus an
//!   in-memory engine with a simple replication stream
//! - **Import**: recursive local file import into an archive
//! - **Discovery**: direct-share peer connections
//! - **Protocol**: gateway handshake constants and shared defaults
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Gateway (dropdat-cli) / Client      │
//! ├─────────────────────────────────────────┤
//! │   ArchiveEngine / Archive traits        │
//! ├──────────────────┬──────────────────────┤
//! │  MemoryEngine    │  Replication stream  │
//! ├──────────────────┴──────────────────────┤
//! │   Importer            │   Discovery     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dropdat_core::{ArchiveEngine, MemoryEngine};
//!
//! let engine = MemoryEngine::new();
//! let archive = engine.create().await?;
//! archive.write_file("hello.txt", "hi".into()).await?;
//! println!("dat://{}", archive.key());
//! ```

pub mod address;
pub mod archive;
pub mod discovery;
pub mod error;
pub mod import;
pub mod key;
pub mod memory;
pub mod protocol;
pub mod replication;

pub use address::{Endpoint, DEFAULT_HOST};
pub use archive::{
    normalize_path, Archive, ArchiveEngine, ArchiveRef, DirEntry, EntryKind, OpenOptions,
    ReplicateOptions, ReplicationIo, ReplicationStream,
};
pub use discovery::{DirectDiscovery, Discovery, PeerConnection};
pub use error::{ArchiveError, Result};
pub use import::{import_paths, ImportFailure, ImportReport};
pub use key::{decode, encode, ArchiveKey, KeyError, KEY_HEX_LEN, KEY_LEN};
pub use memory::{MemoryArchive, MemoryEngine};
pub use protocol::{is_early_close, DEFAULT_HTTP_PORT, DEFAULT_UPLOAD_PORT};
