//! # drop-dat gateway
//!
//! Relays archives uploaded by `drop-dat --upload` and serves them over
//! HTTP at `/<key>/` for as long as the uploading client stays connected.
//!
//! This crate provides:
//! - **Upload sessions**: raw key handshake followed by replication relay,
//!   over plain TCP or an HTTP connection upgraded to `drop-dat`
//! - **Site registry**: one live handler per archive key
//! - **HTTP router**: dispatch by key with the prefix stripped
//! - **Site handler**: file serving, index pages and directory listings
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────┐      ┌───────────────────────┐
//! │   Uploading client    │      │     HTTP clients      │
//! └───────────┬───────────┘      └───────────┬───────────┘
//!             │ key + replication            │ GET /<key>/path
//! ┌───────────▼───────────┐      ┌───────────▼───────────┐
//! │    Upload session     │      │      HTTP router      │
//! ├───────────────────────┤      ├───────────────────────┤
//! │ open sparse + relay   │      │  lookup + strip key   │
//! └───────────┬───────────┘      └───────────┬───────────┘
//!             │ register / unregister        │
//! ┌───────────▼──────────────────────────────▼───────────┐
//! │                    Site registry                     │
//! ├──────────────────────────────────────────────────────┤
//! │                     dropdat-core                     │
//! │            (archive engine, replication)             │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod server;
pub mod session;
pub mod share;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, SessionError};
pub use handlers::{site_router, SiteOptions};
pub use registry::{Registration, SiteRegistry};
pub use server::{run_server, run_server_with_shutdown, Gateway};
pub use session::{spawn_session, SessionOutcome, SessionState, UploadSession};
pub use share::share;
pub use state::AppState;
