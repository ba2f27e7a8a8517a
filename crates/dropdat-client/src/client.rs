//! Upload client implementation

use crate::progress::{ProgressStream, UploadProgress};
use crate::{ClientConfig, ClientError, Result, Transport};
use dropdat_core::protocol::UPGRADE_PROTOCOL;
use dropdat_core::{is_early_close, Archive, ArchiveKey, Endpoint, ReplicateOptions};
use reqwest::{header, Client, StatusCode, Upgraded};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument};

/// Totals for a finished relay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Bytes written to the gateway
    pub sent: u64,
    /// Bytes read from the gateway
    pub received: u64,
}

/// Transport to the gateway: a raw socket or an upgraded HTTP connection
pub enum GatewayStream {
    Tcp(TcpStream),
    Upgraded(Upgraded),
}

impl AsyncRead for GatewayStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Upgraded(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for GatewayStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Upgraded(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Upgraded(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Upgraded(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Relays archives through a gateway
pub struct UploadClient {
    config: ClientConfig,
    http: Client,
    progress: Option<UnboundedSender<UploadProgress>>,
}

impl UploadClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        // Upgrades only exist in HTTP/1.1
        let http = Client::builder()
            .http1_only()
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            config,
            http,
            progress: None,
        })
    }

    /// Report progress on `tx`
    pub fn with_progress(mut self, tx: UnboundedSender<UploadProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve an endpoint against this client's defaults.
    ///
    /// With the upgrade transport the session goes through the HTTP port.
    pub fn resolve(&self, endpoint: &Endpoint) -> (String, u16) {
        let default_port = match self.config.transport {
            Transport::Tcp => self.config.default_port,
            Transport::HttpUpgrade => self.config.http_port,
        };
        endpoint.resolve(&self.config.default_host, default_port)
    }

    /// URL where the gateway will serve `key`
    pub fn gateway_url(&self, endpoint: &Endpoint, key: ArchiveKey) -> String {
        let (host, _) = self.resolve(endpoint);
        format!("http://{}:{}/{}/", host, self.config.http_port, key)
    }

    /// Open a session transport to the gateway
    #[instrument(skip(self))]
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<Connection<GatewayStream>> {
        let (host, port) = self.resolve(endpoint);
        let addr = format!("{}:{}", host, port);

        let stream = match self.config.transport {
            Transport::Tcp => GatewayStream::Tcp(connect_tcp(&addr).await?),
            Transport::HttpUpgrade => GatewayStream::Upgraded(self.request_upgrade(&addr).await?),
        };

        info!(addr = %addr, "connected to gateway");
        self.notify(UploadProgress::Connected { addr });

        Ok(Connection {
            stream,
            progress: self.progress.clone(),
            live: self.config.live,
        })
    }

    /// Ask the gateway to switch an HTTP connection to the session protocol
    async fn request_upgrade(&self, addr: &str) -> Result<Upgraded> {
        let url = format!("http://{}{}", addr, self.config.upgrade_path);
        let response = self
            .http
            .get(&url)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, UPGRADE_PROTOCOL)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClientError::Connection {
                        addr: addr.to_string(),
                        source: io::Error::other(e),
                    }
                } else {
                    ClientError::Http(e)
                }
            })?;

        let status = response.status();
        if status != StatusCode::SWITCHING_PROTOCOLS {
            return Err(ClientError::UpgradeRefused(status.to_string()));
        }

        let upgraded = response.upgrade().await?;
        debug!(url = %url, "session upgraded");
        Ok(upgraded)
    }

    /// Connect, send the key and relay `archive` until the session ends
    pub async fn upload(&self, archive: &dyn Archive, endpoint: &Endpoint) -> Result<UploadSummary> {
        let mut connection = self.connect(endpoint).await?;
        connection.send_key(archive.key()).await?;
        connection.relay(archive).await
    }

    fn notify(&self, event: UploadProgress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}

/// An open session transport
pub struct Connection<S> {
    stream: S,
    progress: Option<UnboundedSender<UploadProgress>>,
    live: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wrap an already established transport
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            progress: None,
            live: true,
        }
    }

    /// Write the raw key: the first and only handshake bytes
    pub async fn send_key(&mut self, key: ArchiveKey) -> Result<()> {
        self.stream.write_all(key.as_bytes()).await?;
        self.stream.flush().await?;
        debug!(key = %key, "sent handshake");
        if let Some(tx) = &self.progress {
            let _ = tx.send(UploadProgress::HandshakeSent);
        }
        Ok(())
    }

    /// Pipe the archive's upload replication stream over the transport
    pub async fn relay(self, archive: &dyn Archive) -> Result<UploadSummary> {
        let mut options = ReplicateOptions::upload();
        options.live = self.live;
        let mut replication = archive.replicate(options);

        let progress = self.progress.clone();
        let mut transport = ProgressStream::new(self.stream, self.progress);

        let summary = match tokio::io::copy_bidirectional(&mut transport, &mut replication).await {
            Ok((received, sent)) => UploadSummary { sent, received },
            Err(e) if is_early_close(&e) => {
                debug!(error = %e, "gateway closed the session");
                UploadSummary {
                    sent: transport.sent(),
                    received: transport.received(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        info!(sent = summary.sent, received = summary.received, "upload session ended");
        if let Some(tx) = progress {
            let _ = tx.send(UploadProgress::Finished {
                sent: summary.sent,
                received: summary.received,
            });
        }
        Ok(summary)
    }
}

async fn connect_tcp(addr: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connection {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
