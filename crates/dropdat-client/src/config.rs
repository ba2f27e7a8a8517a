//! Client configuration

use dropdat_core::protocol::UPGRADE_PATH;
use dropdat_core::{DEFAULT_HOST, DEFAULT_HTTP_PORT, DEFAULT_UPLOAD_PORT};

/// How the client reaches the gateway's session handler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transport {
    /// Raw TCP to the upload port
    #[default]
    Tcp,
    /// HTTP/1.1 `Upgrade` on the gateway's HTTP port
    HttpUpgrade,
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Host used when the endpoint names none
    pub default_host: String,
    /// Upload port used when the endpoint names none
    pub default_port: u16,
    /// Gateway HTTP port, used for the printed URL and for upgrades
    pub http_port: u16,
    /// Session transport
    pub transport: Transport,
    /// Request path for upgraded sessions
    pub upgrade_path: String,
    /// Keep relaying writes after the initial upload
    pub live: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_host: DEFAULT_HOST.to_string(),
            default_port: DEFAULT_UPLOAD_PORT,
            http_port: DEFAULT_HTTP_PORT,
            transport: Transport::Tcp,
            upgrade_path: UPGRADE_PATH.to_string(),
            live: true,
        }
    }
}

impl ClientConfig {
    /// Use the HTTP upgrade transport
    pub fn with_upgrade(mut self) -> Self {
        self.transport = Transport::HttpUpgrade;
        self
    }

    /// Set the gateway HTTP port
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Stop after the initial upload instead of relaying later writes
    pub fn once(mut self) -> Self {
        self.live = false;
        self
    }
}
