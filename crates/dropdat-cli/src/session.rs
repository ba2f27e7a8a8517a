//! Upload sessions
//!
//! A session reads the 32-byte archive key, opens the archive sparsely,
//! registers its site handler and then relays the transport against the
//! archive's download replication stream until either side closes.

use crate::handlers::{site_router, SiteOptions};
use crate::registry::SiteRegistry;
use crate::{AppState, SessionError};
use dropdat_core::protocol::HANDSHAKE_LEN;
use dropdat_core::{
    is_early_close, ArchiveEngine, ArchiveKey, OpenOptions, ReplicateOptions,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error, info};

/// Where a session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the key handshake
    AwaitingKey,
    /// Opening the archive and registering its handler
    Registering,
    /// Relaying replication data
    Relaying,
    /// Done; nothing is registered
    Closed,
}

/// How a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Transport closed before a whole key arrived; nothing was registered
    HandshakeIncomplete,
    /// Relay finished or the peer went away
    Closed,
    /// A newer session for the same key took over
    Evicted,
}

/// One upload session over transport `S`
pub struct UploadSession<S> {
    transport: S,
    peer: String,
    state: SessionState,
    engine: Arc<dyn ArchiveEngine>,
    registry: SiteRegistry,
    site_options: SiteOptions,
}

impl<S> UploadSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(transport: S, peer: impl Into<String>, state: &AppState) -> Self {
        Self {
            transport,
            peer: peer.into(),
            state: SessionState::AwaitingKey,
            engine: Arc::clone(&state.engine),
            registry: state.registry.clone(),
            site_options: state.site_options(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(peer = %self.peer, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Drive the session to completion
    pub async fn run(mut self) -> Result<SessionOutcome, SessionError> {
        let Some(key) = self.read_key().await? else {
            debug!(peer = %self.peer, "transport closed during handshake");
            self.transition(SessionState::Closed);
            return Ok(SessionOutcome::HandshakeIncomplete);
        };

        self.transition(SessionState::Registering);
        let archive = match self.engine.open(key, OpenOptions::sparse()).await {
            Ok(archive) => archive,
            Err(source) => {
                self.transition(SessionState::Closed);
                return Err(SessionError::Archive { key, source });
            }
        };

        let handler = site_router(Arc::clone(&archive), self.site_options.clone());
        let mut registration = self.registry.register(key, handler);
        info!(key = %key, peer = %self.peer, "added site");

        self.transition(SessionState::Relaying);
        let mut replication = archive.replicate(ReplicateOptions::download());
        let result = tokio::select! {
            relayed = tokio::io::copy_bidirectional(&mut self.transport, &mut replication) => {
                relayed.map(|(up, down)| {
                    debug!(key = %key, received = up, sent = down, "relay finished");
                    SessionOutcome::Closed
                })
            }
            _ = registration.evicted() => Ok(SessionOutcome::Evicted),
        };

        drop(replication);
        drop(registration);
        self.transition(SessionState::Closed);
        info!(key = %key, peer = %self.peer, "removed site");

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if is_early_close(&e) => {
                debug!(key = %key, error = %e, "peer closed the session");
                Ok(SessionOutcome::Closed)
            }
            Err(source) => Err(SessionError::Relay { key, source }),
        }
    }

    /// Read exactly the handshake; `None` if the transport closes first
    async fn read_key(&mut self) -> Result<Option<ArchiveKey>, SessionError> {
        let mut raw = [0u8; HANDSHAKE_LEN];
        match self.transport.read_exact(&mut raw).await {
            Ok(_) => Ok(Some(ArchiveKey::new(raw))),
            Err(e) if is_early_close(&e) => Ok(None),
            Err(e) => Err(SessionError::Handshake(e)),
        }
    }
}

/// Run a session in the background, logging how it ended
pub fn spawn_session<S>(transport: S, peer: String, state: Arc<AppState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let session = UploadSession::new(transport, peer.clone(), &state);
        match session.run().await {
            Ok(outcome) => debug!(peer = %peer, ?outcome, "session ended"),
            Err(e) => error!(peer = %peer, error = %e, "Error handling client"),
        }
    });
}
