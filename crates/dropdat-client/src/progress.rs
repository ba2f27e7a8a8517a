//! Upload progress notifications

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc::UnboundedSender;

/// Upload progress information
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadProgress {
    /// Transport to the gateway is open
    Connected { addr: String },
    /// Archive key written
    HandshakeSent,
    /// Total bytes written to the gateway so far
    Sent { total: u64 },
    /// Total bytes read from the gateway so far
    Received { total: u64 },
    /// Relay finished
    Finished { sent: u64, received: u64 },
}

pin_project! {
    /// Transport wrapper reporting byte counts as they flow
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        sent: u64,
        received: u64,
        progress: Option<UnboundedSender<UploadProgress>>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, progress: Option<UnboundedSender<UploadProgress>>) -> Self {
        Self {
            inner,
            sent: 0,
            received: 0,
            progress,
        }
    }

    /// Bytes written through this stream
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Bytes read through this stream
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn notify(progress: &Option<UnboundedSender<UploadProgress>>, event: UploadProgress) {
    if let Some(tx) = progress {
        // A listener that went away is not an upload failure.
        let _ = tx.send(event);
    }
}

impl<S: AsyncRead> AsyncRead for ProgressStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let result = this.inner.poll_read(cx, buf);
        let read = (buf.filled().len() - before) as u64;
        if read > 0 {
            *this.received += read;
            notify(this.progress, UploadProgress::Received { total: *this.received });
        }
        result
    }
}

impl<S: AsyncWrite> AsyncWrite for ProgressStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.project();
        let result = this.inner.poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &result {
            if *written > 0 {
                *this.sent += *written as u64;
                notify(this.progress, UploadProgress::Sent { total: *this.sent });
            }
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}
