//! Replication stream for in-memory archives
//!
//! Each stream is one end of an in-process duplex pipe; the other end is
//! driven by a background task. Content travels as a sequence of frames:
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────┬──────────┐
//! │ path len u32 │ path     │ data len u64 │ data     │
//! └──────────────┴──────────┴──────────────┴──────────┘
//! ```
//!
//! Upload sends a snapshot of every file, then (when live) each later write.
//! Download applies incoming frames to the archive. A direction that is not
//! enabled is closed (outgoing) or drained (incoming) so the peer never
//! stalls on it.

use crate::memory::{FileUpdate, MemoryArchive};
use crate::{ArchiveError, ReplicateOptions, ReplicationStream, Result};
use bytes::Bytes;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

/// In-process pipe buffer size
const PIPE_CAPACITY: usize = 64 * 1024;

/// Upper bound on an encoded path
pub const MAX_PATH_LEN: u32 = 4096;

/// Upper bound on a single file carried in one frame
pub const MAX_FILE_LEN: u64 = 1 << 30;

pin_project! {
    /// Caller's end of a replication pipe. Dropping it stops live upload.
    ///
    /// If the background task fails, the next read or write returns the
    /// failure as `InvalidData`. When downloading, end of stream is only
    /// reported once the task has finished cleanly.
    pub struct MemoryReplication {
        #[pin]
        io: DuplexStream,
        _closed: oneshot::Sender<()>,
        task: Option<oneshot::Receiver<String>>,
        hold_eof: bool,
    }
}

/// `Ready(Some(_))` once the task failed, `Ready(None)` once it finished
fn poll_task(task: &mut Option<oneshot::Receiver<String>>, cx: &mut Context<'_>) -> Poll<Option<io::Error>> {
    let Some(rx) = task.as_mut() else {
        return Poll::Ready(None);
    };
    let outcome = ready!(Pin::new(rx).poll(cx));
    *task = None;
    Poll::Ready(outcome.ok().map(|message| io::Error::new(io::ErrorKind::InvalidData, message)))
}

impl AsyncRead for MemoryReplication {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        if let Poll::Ready(Some(err)) = poll_task(this.task, cx) {
            return Poll::Ready(Err(err));
        }

        let filled = buf.filled().len();
        ready!(this.io.poll_read(cx, buf))?;
        if buf.filled().len() > filled || buf.remaining() == 0 || !*this.hold_eof {
            return Poll::Ready(Ok(()));
        }

        // Pipe ended: hold the EOF until the task says how it went
        match ready!(poll_task(this.task, cx)) {
            Some(err) => Poll::Ready(Err(err)),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncWrite for MemoryReplication {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.project();
        if let Poll::Ready(Some(err)) = poll_task(this.task, cx) {
            return Poll::Ready(Err(err));
        }
        this.io.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().io.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().io.poll_shutdown(cx)
    }
}

/// Start replicating `archive`, returning the caller's end of the pipe
pub(crate) fn spawn(archive: MemoryArchive, options: ReplicateOptions) -> ReplicationStream {
    let (local, mut remote) = tokio::io::duplex(PIPE_CAPACITY);
    let (closed_tx, closed_rx) = oneshot::channel();
    let (failed_tx, failed_rx) = oneshot::channel();

    let hold_eof = options.download;
    tokio::spawn(async move {
        let key = crate::Archive::key(&archive);
        match run(archive, &mut remote, options, closed_rx).await {
            Ok(()) => debug!(key = %key, "replication finished"),
            Err(e) => {
                warn!(key = %key, error = %e, "replication failed");
                // Report before the pipe closes so the caller never sees a clean end
                let _ = failed_tx.send(e.to_string());
            }
        }
        drop(remote);
    });

    Box::new(MemoryReplication {
        io: local,
        _closed: closed_tx,
        task: Some(failed_rx),
        hold_eof,
    })
}

async fn run(
    archive: MemoryArchive,
    io: &mut DuplexStream,
    options: ReplicateOptions,
    closed: oneshot::Receiver<()>,
) -> Result<()> {
    let (mut reader, mut writer) = tokio::io::split(io);

    let outgoing = async {
        if options.upload {
            send_files(&archive, &mut writer, options.live, closed).await?;
        }
        writer.shutdown().await?;
        Ok::<_, ArchiveError>(())
    };

    let incoming = async {
        if options.download {
            receive_files(&archive, &mut reader).await
        } else {
            tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
            Ok(())
        }
    };

    tokio::try_join!(outgoing, incoming)?;
    Ok(())
}

async fn send_files<W: AsyncWrite + Unpin>(
    archive: &MemoryArchive,
    writer: &mut W,
    live: bool,
    mut closed: oneshot::Receiver<()>,
) -> Result<()> {
    // Subscribe before the snapshot so no write slips between the two.
    let mut updates = archive.subscribe();

    for (path, data) in archive.snapshot() {
        write_frame(writer, &path, &data).await?;
    }
    writer.flush().await?;

    if !live {
        return Ok(());
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok((path, data)) => {
                    write_frame(writer, &path, &data).await?;
                    writer.flush().await?;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "live replication lagged, resending snapshot");
                    for (path, data) in archive.snapshot() {
                        write_frame(writer, &path, &data).await?;
                    }
                    writer.flush().await?;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = &mut closed => return Ok(()),
        }
    }
}

async fn receive_files<R: AsyncRead + Unpin>(archive: &MemoryArchive, reader: &mut R) -> Result<()> {
    while let Some((path, data)) = read_frame(reader).await? {
        debug!(path = %path, size = data.len(), "received file");
        archive.apply(&path, data)?;
    }
    Ok(())
}

/// Encode one file frame
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, path: &str, data: &[u8]) -> Result<()> {
    let path_len = u32::try_from(path.len())
        .ok()
        .filter(|len| *len <= MAX_PATH_LEN)
        .ok_or_else(|| ArchiveError::Protocol(format!("path too long: {} bytes", path.len())))?;

    writer.write_u32(path_len).await?;
    writer.write_all(path.as_bytes()).await?;
    writer.write_u64(data.len() as u64).await?;
    writer.write_all(data).await?;
    Ok(())
}

/// Decode one file frame; `None` on a clean end of stream between frames
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<FileUpdate>> {
    let path_len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if path_len > MAX_PATH_LEN {
        return Err(ArchiveError::Protocol(format!("path too long: {} bytes", path_len)));
    }

    let mut path = vec![0u8; path_len as usize];
    reader.read_exact(&mut path).await?;
    let path = String::from_utf8(path)
        .map_err(|_| ArchiveError::Protocol("path is not valid UTF-8".to_string()))?;

    let data_len = reader.read_u64().await?;
    if data_len > MAX_FILE_LEN {
        return Err(ArchiveError::Protocol(format!("file too large: {} bytes", data_len)));
    }

    // Grow with what actually arrives rather than what the header claims
    let mut data = Vec::new();
    (&mut *reader).take(data_len).read_to_end(&mut data).await?;
    if data.len() as u64 != data_len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "frame truncated").into());
    }
    Ok(Some((path, Bytes::from(data))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{is_early_close, Archive, ArchiveKey, OpenOptions};
    use std::time::Duration;

    async fn wait_for_file(archive: &MemoryArchive, path: &str) -> Bytes {
        for _ in 0..100 {
            if let Ok(data) = archive.read_file(path).await {
                return data;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("file {} never arrived", path);
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "a/b.txt", b"content").await.unwrap();

        let mut reader = buf.as_slice();
        let (path, data) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(path, "a/b.txt");
        assert_eq!(data, "content");
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_rejects_oversized_path() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_PATH_LEN + 1).to_be_bytes());
        let result = read_frame(&mut buf.as_slice()).await;
        assert!(matches!(result, Err(ArchiveError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_frame_truncated_mid_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, "file", b"0123456789").await.unwrap();
        buf.truncate(buf.len() - 3);
        let result = read_frame(&mut buf.as_slice()).await;
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[tokio::test]
    async fn test_frame_length_beyond_received_data() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.push(b'a');
        buf.extend_from_slice(&MAX_FILE_LEN.to_be_bytes());
        buf.extend_from_slice(b"short");
        let result = read_frame(&mut buf.as_slice()).await;
        assert!(matches!(result, Err(ArchiveError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test_log::test(tokio::test)]
    async fn test_download_failure_reaches_caller() {
        let mirror = MemoryArchive::open(ArchiveKey::new([7; 32]), OpenOptions::sparse());
        let mut down = mirror.replicate(ReplicateOptions::download());

        let mut malformed = u32::MAX.to_be_bytes().to_vec();
        malformed.extend_from_slice(&[0u8; 128]);
        down.write_all(&malformed).await.unwrap();

        let mut received = Vec::new();
        let err = tokio::time::timeout(Duration::from_secs(5), down.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!is_early_close(&err));
    }

    #[tokio::test]
    async fn test_download_clean_end() {
        let mirror = MemoryArchive::open(ArchiveKey::new([8; 32]), OpenOptions::sparse());
        let mut down = mirror.replicate(ReplicateOptions::download());

        write_frame(&mut down, "ok.txt", b"fine").await.unwrap();
        down.shutdown().await.unwrap();

        let mut received = Vec::new();
        down.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert_eq!(mirror.read_file("ok.txt").await.unwrap(), "fine");
    }

    #[test_log::test(tokio::test)]
    async fn test_replicate_between_archives() {
        let source = MemoryArchive::create();
        source.write_file("index.html", Bytes::from_static(b"<h1>hi</h1>")).await.unwrap();

        let mirror = MemoryArchive::open(source.key(), OpenOptions::sparse());
        let mut up = source.replicate(ReplicateOptions::upload().live());
        let mut down = mirror.replicate(ReplicateOptions::download());

        let pump = tokio::spawn(async move {
            let _ = tokio::io::copy_bidirectional(&mut up, &mut down).await;
        });

        assert_eq!(wait_for_file(&mirror, "index.html").await, "<h1>hi</h1>");

        // Live: later writes follow
        source.write_file("later.txt", Bytes::from_static(b"later")).await.unwrap();
        assert_eq!(wait_for_file(&mirror, "later.txt").await, "later");

        pump.abort();
    }

    #[tokio::test]
    async fn test_non_live_upload_ends() {
        let source = MemoryArchive::create();
        source.write_file("a.txt", Bytes::from_static(b"a")).await.unwrap();

        let mut up = source.replicate(ReplicateOptions::upload());
        let mut received = Vec::new();
        up.shutdown().await.unwrap();
        up.read_to_end(&mut received).await.unwrap();

        let (path, data) = read_frame(&mut received.as_slice()).await.unwrap().unwrap();
        assert_eq!(path, "a.txt");
        assert_eq!(data, "a");
    }
}
