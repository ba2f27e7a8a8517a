//! Server startup and lifecycle

use crate::registry::SiteRegistry;
use crate::{routes, session, AppState, GatewayConfig};
use anyhow::Context;
use dropdat_core::{ArchiveEngine, MemoryEngine};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Both gateway listeners, bound and ready to serve
pub struct Gateway {
    state: Arc<AppState>,
    upload_listener: Option<TcpListener>,
    http_listener: TcpListener,
}

impl Gateway {
    /// Bind the upload and HTTP listeners
    pub async fn bind(config: GatewayConfig, engine: Arc<dyn ArchiveEngine>) -> anyhow::Result<Self> {
        if !config.accept_tcp && !config.allow_upgrade {
            anyhow::bail!("no upload transport enabled");
        }

        let upload_listener = if config.accept_tcp {
            let addr = config.upload_addr();
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind upload listener on {}", addr))?;
            Some(listener)
        } else {
            None
        };

        let addr = config.http_addr();
        let http_listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {}", addr))?;

        Ok(Self {
            state: Arc::new(AppState::new(config, engine)),
            upload_listener,
            http_listener,
        })
    }

    /// Address accepting raw upload sessions, if enabled
    pub fn upload_addr(&self) -> Option<SocketAddr> {
        self.upload_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Address serving archives over HTTP
    pub fn http_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.http_listener.local_addr()?)
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.state.registry
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Serve until the process is stopped
    pub async fn serve(self) -> anyhow::Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn serve_with_shutdown(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let app = routes::create_router(Arc::clone(&self.state));

        if let Some(addr) = self.upload_addr() {
            info!("Gateway accepting uploads on {}", addr);
        }
        if let Ok(addr) = self.http_addr() {
            info!("Gateway serving archives on http://{}", addr);
        }
        if self.state.config.allow_upgrade {
            info!("Upgraded upload sessions enabled on the HTTP port");
        }

        let uploads = accept_uploads(self.upload_listener, Arc::clone(&self.state));
        let http = axum::serve(self.http_listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .into_future();

        tokio::select! {
            result = http => result?,
            _ = uploads => {}
        }

        info!("Gateway shutdown complete");
        Ok(())
    }
}

/// Accept raw upload sessions forever; accept errors are logged, never fatal
async fn accept_uploads(listener: Option<TcpListener>, state: Arc<AppState>) {
    let Some(listener) = listener else {
        return std::future::pending().await;
    };

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    error!(peer = %peer, error = %e, "failed to configure upload socket");
                }
                session::spawn_session(stream, peer.to_string(), Arc::clone(&state));
            }
            Err(e) => {
                error!(error = %e, "failed to accept upload connection");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Run the gateway with an in-memory archive engine
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Run the gateway with an in-memory archive engine until `shutdown_signal`
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let gateway = Gateway::bind(config, Arc::new(MemoryEngine::new())).await?;
    gateway.serve_with_shutdown(shutdown_signal).await
}
