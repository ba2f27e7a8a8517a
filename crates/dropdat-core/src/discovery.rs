//! Peer discovery for direct sharing
//!
//! Discovery is consumed as a stream of connected peers. Real swarm
//! discovery is out of scope; [`DirectDiscovery`] simply accepts peers that
//! dial a known TCP address.

use crate::{ArchiveError, ArchiveKey, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Pending peers buffered before the consumer picks them up
const PEER_QUEUE: usize = 16;

/// A peer that connected for an archive
#[derive(Debug)]
pub struct PeerConnection {
    /// Remote address
    pub addr: SocketAddr,
    /// Transport to replicate over
    pub stream: TcpStream,
}

/// Source of peer connections for an archive
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Start announcing `key`; yields every peer that connects
    async fn join(&self, key: ArchiveKey) -> Result<mpsc::Receiver<PeerConnection>>;
}

/// Accepts peers on a bound TCP listener
pub struct DirectDiscovery {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
}

impl DirectDiscovery {
    /// Bind the listener peers will dial
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
        })
    }

    /// Address peers should connect to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Discovery for DirectDiscovery {
    async fn join(&self, key: ArchiveKey) -> Result<mpsc::Receiver<PeerConnection>> {
        let listener = self.listener.lock().take().ok_or_else(|| {
            ArchiveError::Io(io::Error::new(
                io::ErrorKind::AddrInUse,
                "discovery listener already joined",
            ))
        })?;

        let (tx, rx) = mpsc::channel(PEER_QUEUE);
        info!(key = %key, addr = %self.local_addr, "accepting direct peers");

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!(peer = %addr, "peer connected");
                        if tx.send(PeerConnection { addr, stream }).await.is_err() {
                            // Consumer went away: stop accepting.
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to accept peer"),
                }
            }
        });

        Ok(rx)
    }
}
