//! # drop-dat
//!
//! Share a locally-assembled archive directly with peers, or relay it through
//! a shared gateway that serves every uploaded archive over HTTP.
//!
//! The workspace is split into:
//! - [`archive`]: archive keys, the archive engine contract, the in-memory
//!   engine, file import and direct-share discovery
//! - [`client`]: the uploading side of the gateway protocol
//! - [`gateway`]: the gateway itself (session relay, site registry, HTTP routing)

pub use dropdat_cli as gateway;
pub use dropdat_client as client;
pub use dropdat_core as archive;
