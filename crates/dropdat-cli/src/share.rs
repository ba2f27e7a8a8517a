//! Direct sharing: replicate an archive to every peer that connects

use dropdat_core::{is_early_close, ArchiveRef, Discovery, ReplicateOptions};
use tracing::{debug, info, warn};

/// Replicate `archive` to peers found through `discovery` until discovery
/// stops yielding peers
pub async fn share(archive: ArchiveRef, discovery: &dyn Discovery) -> anyhow::Result<()> {
    let mut peers = discovery.join(archive.key()).await?;

    while let Some(peer) = peers.recv().await {
        info!(peer = %peer.addr, "peer connected");
        let archive = archive.clone();
        tokio::spawn(async move {
            let mut stream = peer.stream;
            let mut replication = archive.replicate(ReplicateOptions::upload().live());
            match tokio::io::copy_bidirectional(&mut stream, &mut replication).await {
                Ok((received, sent)) => debug!(peer = %peer.addr, sent, received, "peer done"),
                Err(e) if is_early_close(&e) => debug!(peer = %peer.addr, "peer went away"),
                Err(e) => warn!(peer = %peer.addr, error = %e, "replication to peer failed"),
            }
        });
    }

    Ok(())
}
