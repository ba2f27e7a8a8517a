//! Endpoint resolution for `--serve` and `--upload`
//!
//! The command line accepts a bare flag, a port, `host:port` or a bare host.
//! That input is turned into an [`Endpoint`] once at the CLI boundary and
//! resolved against defaults; resolution never fails.

use serde::{Deserialize, Serialize};

/// Default host used when none is given
pub const DEFAULT_HOST: &str = "localhost";

/// A partially specified network endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    /// Use both the default host and port
    Default,
    /// Default host, explicit port
    PortOnly(u16),
    /// Explicit host, default port
    Host(String),
    /// Explicit host and port
    HostPort(String, u16),
}

impl Endpoint {
    /// Parse a user-supplied address. Never fails: anything that does not
    /// parse as a port falls back to the default.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::Default;
        }

        if input.bytes().all(|b| b.is_ascii_digit()) {
            return input.parse().map(Self::PortOnly).unwrap_or(Self::Default);
        }

        match input.rsplit_once(':') {
            Some((host, port)) => {
                let host = host.trim();
                match (host.is_empty(), port.trim().parse::<u16>()) {
                    (true, Ok(port)) => Self::PortOnly(port),
                    (true, Err(_)) => Self::Default,
                    (false, Ok(port)) => Self::HostPort(host.to_string(), port),
                    (false, Err(_)) => Self::Host(host.to_string()),
                }
            }
            None => Self::Host(input.to_string()),
        }
    }

    /// Resolve into a concrete `(host, port)` pair
    pub fn resolve(&self, default_host: &str, default_port: u16) -> (String, u16) {
        match self {
            Self::Default => (default_host.to_string(), default_port),
            Self::PortOnly(port) => (default_host.to_string(), *port),
            Self::Host(host) => (host.clone(), default_port),
            Self::HostPort(host, port) => (host.clone(), *port),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Default
    }
}

impl From<bool> for Endpoint {
    fn from(_: bool) -> Self {
        Self::Default
    }
}

impl From<u16> for Endpoint {
    fn from(port: u16) -> Self {
        Self::PortOnly(port)
    }
}

impl From<&str> for Endpoint {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl From<Option<String>> for Endpoint {
    fn from(input: Option<String>) -> Self {
        input.as_deref().map(Self::parse).unwrap_or_default()
    }
}
