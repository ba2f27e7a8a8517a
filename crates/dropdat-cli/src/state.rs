//! Application state

use crate::config::GatewayConfig;
use crate::handlers::SiteOptions;
use crate::registry::SiteRegistry;
use dropdat_core::ArchiveEngine;
use std::sync::Arc;

/// Application state shared across handlers and sessions
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Archives currently being served
    pub registry: SiteRegistry,
    /// Engine opening uploaded archives
    pub engine: Arc<dyn ArchiveEngine>,
}

impl AppState {
    /// Create a new application state with an empty registry
    pub fn new(config: GatewayConfig, engine: Arc<dyn ArchiveEngine>) -> Self {
        Self {
            config,
            registry: SiteRegistry::new(),
            engine,
        }
    }

    /// Presentation options for newly registered sites
    pub fn site_options(&self) -> SiteOptions {
        SiteOptions {
            expose_headers: self.config.expose_headers,
            live: self.config.live,
            footer: self.config.footer.clone(),
        }
    }
}
