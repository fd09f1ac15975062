use std::sync::Arc;

use arc_swap::ArcSwap;
use probe_types::StorageProvider;

/// The SP cache (§5): "read-mostly, written only by the loader; readers
/// take a snapshot for the duration of a batch to avoid read-during-clear."
///
/// Backed by an atomically-swapped `Arc` so a reload never blocks a reader
/// mid-snapshot.
#[derive(Clone, Default)]
pub struct SpCache {
    inner: Arc<ArcSwap<Vec<StorageProvider>>>,
}

impl SpCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    pub fn reload(&self, providers: Vec<StorageProvider>) {
        self.inner.store(Arc::new(providers));
    }

    /// A stable snapshot for the duration of one batch.
    pub fn snapshot(&self) -> Arc<Vec<StorageProvider>> {
        self.inner.load_full()
    }

    pub fn find(&self, address: &str) -> Option<StorageProvider> {
        self.snapshot().iter().find(|p| p.address == address).cloned()
    }
}
