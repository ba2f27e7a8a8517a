//! # drop-dat client
//!
//! Relays a local archive through a drop-dat gateway.
//!
//! The client connects to the gateway's upload port (or upgrades an HTTP
//! connection), writes the raw 32-byte archive key, then pipes the archive's
//! replication stream over the connection until either side closes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dropdat_client::{ClientConfig, UploadClient};
//! use dropdat_core::Endpoint;
//!
//! let client = UploadClient::new(ClientConfig::default().with_upgrade())?;
//! let endpoint = Endpoint::parse("gateway.example.com");
//! println!("{}", client.gateway_url(&endpoint, archive.key()));
//! client.upload(archive.as_ref(), &endpoint).await?;
//! ```

mod client;
mod config;
mod error;
mod progress;

pub use client::{Connection, GatewayStream, UploadClient, UploadSummary};
pub use config::{ClientConfig, Transport};
pub use error::{ClientError, Result};
pub use progress::{ProgressStream, UploadProgress};
