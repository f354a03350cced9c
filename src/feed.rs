//! Change notification plumbing.
//!
//! Backends keep a [`Listeners`] registry and call [`Listeners::notify`]
//! after every committed write. The chore store turns those bare
//! notifications into full snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::models::Chore;
use crate::storage::DocumentStore;

/// Callback invoked after a collection changed.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Registration id returned by [`DocumentStore::listen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Per-backend registry of collection listeners.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, String, ChangeCallback)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, collection: &str, callback: ChangeCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.entries.lock() {
            Ok(mut entries) => entries.push((id, collection.to_string(), callback)),
            Err(e) => warn!(error = %e, "listener registry poisoned, listener not added"),
        }
        id
    }

    pub fn remove(&self, id: ListenerId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|(entry_id, _, _)| *entry_id != id);
        }
    }

    /// Calls every listener of `collection`. The registry lock is released
    /// before callbacks run so they may read the store or unregister.
    pub fn notify(&self, collection: &str) {
        let callbacks: Vec<ChangeCallback> = match self.entries.lock() {
            Ok(entries) => entries
                .iter()
                .filter(|(_, c, _)| c == collection)
                .map(|(_, _, cb)| Arc::clone(cb))
                .collect(),
            Err(_) => return,
        };
        trace!(collection, listeners = callbacks.len(), "notifying listeners");
        for cb in callbacks {
            cb();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full materialized chore list of one group at one point in time.
pub type ChoreSnapshot = Vec<Chore>;

/// Keeps a backend listener registered until released or dropped.
pub struct SubscriptionHandle {
    backend: Arc<dyn DocumentStore>,
    id: Option<ListenerId>,
}

impl SubscriptionHandle {
    pub(crate) fn new(backend: Arc<dyn DocumentStore>, id: ListenerId) -> Self {
        Self { backend, id: Some(id) }
    }

    /// Stops delivery of further snapshots.
    pub fn release(mut self) {
        self.unregister();
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    fn unregister(&mut self) {
        if let Some(id) = self.id.take() {
            debug!(listener = id.0, "releasing subscription");
            self.backend.unlisten(id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Channel flavour of a chore subscription: always holds the latest
/// immutable snapshot and flags when a newer one arrived.
pub struct Subscription {
    rx: watch::Receiver<Arc<ChoreSnapshot>>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub(crate) fn new(rx: watch::Receiver<Arc<ChoreSnapshot>>, handle: SubscriptionHandle) -> Self {
        Self { rx, handle }
    }

    /// Most recent snapshot, marking it seen.
    pub fn latest(&mut self) -> Arc<ChoreSnapshot> {
        Arc::clone(&self.rx.borrow_and_update())
    }

    /// Whether a snapshot newer than the last one seen has arrived.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn mark_seen(&mut self) {
        self.rx.mark_unchanged();
    }

    /// Waits for the next snapshot. Returns `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<Arc<ChoreSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.latest())
    }

    pub fn release(self) {
        self.handle.release();
    }
}
