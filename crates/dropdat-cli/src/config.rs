//! Gateway configuration

use dropdat_core::{DEFAULT_HTTP_PORT, DEFAULT_UPLOAD_PORT};
use serde::{Deserialize, Serialize};

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind both listeners to
    pub host: String,
    /// Port accepting raw upload sessions
    pub upload_port: u16,
    /// Port serving archives over HTTP
    pub http_port: u16,
    /// Accept raw TCP upload sessions on `upload_port`
    pub accept_tcp: bool,
    /// Accept upload sessions upgraded from HTTP on `http_port`
    pub allow_upgrade: bool,
    /// Add archive key/version headers and expose them via CORS
    pub expose_headers: bool,
    /// Mark served content as live (not cacheable)
    pub live: bool,
    /// Footer appended to directory listings
    pub footer: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            upload_port: DEFAULT_UPLOAD_PORT,
            http_port: DEFAULT_HTTP_PORT,
            accept_tcp: true,
            allow_upgrade: false,
            expose_headers: true,
            live: true,
            footer: None,
        }
    }
}

impl GatewayConfig {
    /// Bind address for upload sessions
    pub fn upload_addr(&self) -> String {
        format!("{}:{}", self.host, self.upload_port)
    }

    /// Bind address for the HTTP surface
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}
