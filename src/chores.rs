//! Group-scoped chore collection: create, edit, delete, list, subscribe.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{ChoreError, Result};
use crate::feed::{ChoreSnapshot, Subscription, SubscriptionHandle};
use crate::models::{Chore, Document, GroupKey};
use crate::storage::{chores_collection, DocumentStore};

#[derive(Clone)]
pub struct ChoreStore {
    backend: Arc<dyn DocumentStore>,
}

impl ChoreStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// Persists a new chore. A fresh document id is assigned unless the
    /// chore already carries one. Returns the chore as stored.
    pub fn create(&self, chore: &Chore, group: GroupKey) -> Result<Chore> {
        let mut stored = chore.clone();
        if stored.id.is_empty() {
            stored.id = Uuid::new_v4().to_string();
        }
        self.backend
            .insert(&chores_collection(group), &stored.id, stored.to_document()?)?;
        debug!(group = %group, id = %stored.id, name = %stored.name, "chore created");
        Ok(stored)
    }

    /// Overwrites every mutable field of an existing chore.
    pub fn edit(&self, id: &str, chore: &Chore, group: GroupKey) -> Result<()> {
        self.backend
            .replace(&chores_collection(group), id, chore.to_document()?)?;
        debug!(group = %group, id, "chore edited");
        Ok(())
    }

    /// Removes one chore. Never touches other occurrences of its series.
    pub fn delete(&self, id: &str, group: GroupKey) -> Result<()> {
        let collection = chores_collection(group);
        if !self.backend.delete(&collection, id)? {
            return Err(ChoreError::not_found(&collection, id));
        }
        debug!(group = %group, id, "chore deleted");
        Ok(())
    }

    pub fn get(&self, group: GroupKey, id: &str) -> Result<Option<Chore>> {
        Ok(self
            .backend
            .get(&chores_collection(group), id)?
            .and_then(|doc| Chore::from_document(id, &doc)))
    }

    /// Like [`get`](Self::get) but a missing chore is an error.
    pub fn require(&self, group: GroupKey, id: &str) -> Result<Chore> {
        self.get(group, id)?
            .ok_or_else(|| ChoreError::not_found(&chores_collection(group), id))
    }

    /// Current full list of the group's chores, unsorted.
    pub fn list(&self, group: GroupKey) -> Result<ChoreSnapshot> {
        list_from(self.backend.as_ref(), group)
    }

    /// Calls `on_change` with the current list right away and again with
    /// the complete list after every change to the group's chores.
    ///
    /// Deliveries are serialized and never go back in time: a snapshot
    /// older than the last one delivered is dropped. `on_change` must not
    /// write to the group's chores itself.
    pub fn subscribe<F>(&self, group: GroupKey, on_change: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&ChoreSnapshot) + Send + Sync + 'static,
    {
        let refresh = self.refresher(group, None, move |snapshot| on_change(&snapshot));
        let handle = self.register(group, Arc::clone(&refresh));
        // Registered first, so a write landing now is either in this
        // snapshot or triggers a newer one.
        refresh()?;
        Ok(handle)
    }

    /// Channel flavour of [`subscribe`](Self::subscribe).
    pub fn watch(&self, group: GroupKey) -> Result<Subscription> {
        let (version, docs) = self.backend.list_versioned(&chores_collection(group))?;
        let (tx, rx) = watch::channel(Arc::new(materialize(docs)));
        let refresh = self.refresher(group, Some(version), move |snapshot| {
            tx.send_replace(Arc::new(snapshot));
        });
        let handle = self.register(group, Arc::clone(&refresh));
        refresh()?;
        Ok(Subscription::new(rx, handle))
    }

    fn register(&self, group: GroupKey, refresh: Refresh) -> SubscriptionHandle {
        let id = self.backend.listen(
            &chores_collection(group),
            Arc::new(move || {
                if let Err(e) = refresh() {
                    warn!(group = %group, error = %e, "could not refresh chore snapshot");
                }
            }),
        );
        debug!(group = %group, listener = id.0, "chore subscription registered");
        SubscriptionHandle::new(Arc::clone(&self.backend), id)
    }

    /// Reads the group's chores and hands them to `deliver` if they are newer
    /// than anything delivered so far. `seen` is the version of a snapshot
    /// the subscriber already holds.
    fn refresher<F>(&self, group: GroupKey, seen: Option<u64>, deliver: F) -> Refresh
    where
        F: Fn(ChoreSnapshot) + Send + Sync + 'static,
    {
        let weak: Weak<dyn DocumentStore> = Arc::downgrade(&self.backend);
        let delivered = Mutex::new(seen);
        Arc::new(move || -> Result<()> {
            let Some(backend) = weak.upgrade() else { return Ok(()) };
            let mut delivered = delivered.lock()?;
            let (version, docs) = backend.list_versioned(&chores_collection(group))?;
            if delivered.map_or(true, |last| version > last) {
                *delivered = Some(version);
                deliver(materialize(docs));
            } else {
                trace!(group = %group, version, "dropping stale chore snapshot");
            }
            Ok(())
        })
    }
}

type Refresh = Arc<dyn Fn() -> Result<()> + Send + Sync>;

fn list_from(backend: &dyn DocumentStore, group: GroupKey) -> Result<ChoreSnapshot> {
    Ok(materialize(backend.list(&chores_collection(group))?))
}

/// Parses raw documents, skipping any without a name.
pub fn materialize(docs: Vec<(String, Document)>) -> ChoreSnapshot {
    docs.iter()
        .filter_map(|(id, doc)| {
            let chore = Chore::from_document(id, doc);
            if chore.is_none() {
                warn!(id = %id, "skipping chore document without a name");
            }
            chore
        })
        .collect()
}
