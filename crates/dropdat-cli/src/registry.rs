//! Registry of archives currently being served
//!
//! Each upload session registers its archive under the archive key for as
//! long as the session lives. Registering a key that is already present
//! replaces the older entry and signals the older session to close.
//!
//! Registration is not authenticated. Whoever knows an archive key can
//! take its entry over, and since frames carry no signatures the newer
//! session decides what is served under that key.

use axum::Router;
use dashmap::DashMap;
use dropdat_core::ArchiveKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Per-archive HTTP handler
pub type SiteHandler = Router;

struct SiteEntry {
    generation: u64,
    handler: SiteHandler,
    evict: oneshot::Sender<()>,
}

/// Concurrent map from archive key to site handler
#[derive(Clone, Default)]
pub struct SiteRegistry {
    sites: Arc<DashMap<ArchiveKey, SiteEntry>>,
    generation: Arc<AtomicU64>,
}

impl SiteRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `key`.
    ///
    /// The entry stays until the returned [`Registration`] is dropped or
    /// released, or until a later registration for the same key replaces it.
    pub fn register(&self, key: ArchiveKey, handler: SiteHandler) -> Registration {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (evict, evicted) = oneshot::channel();

        let previous = self.sites.insert(
            key,
            SiteEntry {
                generation,
                handler,
                evict,
            },
        );
        if let Some(previous) = previous {
            warn!(key = %key, "archive registered again, closing the previous session");
            let _ = previous.evict.send(());
        }

        Registration {
            registry: self.clone(),
            key,
            generation,
            evicted: Some(evicted),
            released: false,
        }
    }

    /// Remove `key` regardless of which session registered it.
    /// The owning session is signalled to close.
    pub fn unregister(&self, key: &ArchiveKey) -> bool {
        match self.sites.remove(key) {
            Some((_, entry)) => {
                let _ = entry.evict.send(());
                true
            }
            None => false,
        }
    }

    /// Remove `key` only if it still belongs to `generation`
    fn unregister_generation(&self, key: &ArchiveKey, generation: u64) -> bool {
        self.sites
            .remove_if(key, |_, entry| entry.generation == generation)
            .is_some()
    }

    /// Handler currently registered for `key`
    pub fn lookup(&self, key: &ArchiveKey) -> Option<SiteHandler> {
        self.sites.get(key).map(|entry| entry.handler.clone())
    }

    pub fn contains(&self, key: &ArchiveKey) -> bool {
        self.sites.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Keys currently registered, in no particular order
    pub fn keys(&self) -> Vec<ArchiveKey> {
        self.sites.iter().map(|entry| *entry.key()).collect()
    }
}

/// Ownership of one registry entry.
///
/// Dropping it removes the entry, unless a newer registration has already
/// replaced it.
pub struct Registration {
    registry: SiteRegistry,
    key: ArchiveKey,
    generation: u64,
    evicted: Option<oneshot::Receiver<()>>,
    released: bool,
}

impl Registration {
    pub fn key(&self) -> ArchiveKey {
        self.key
    }

    /// Resolves once this entry has been replaced or removed by someone else
    pub async fn evicted(&mut self) {
        if let Some(rx) = self.evicted.as_mut() {
            let _ = rx.await;
            self.evicted = None;
        }
    }

    /// Remove the entry now. Returns false if it was already replaced.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.registry.unregister_generation(&self.key, self.generation)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.released && self.registry.unregister_generation(&self.key, self.generation) {
            debug!(key = %self.key, "site unregistered");
        }
    }
}
