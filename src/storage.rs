use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ChoreError, Result};
use crate::feed::{ChangeCallback, ListenerId, Listeners};
use crate::models::{Document, GroupKey};

/// Collection holding every user profile.
pub const USERS: &str = "users";

/// Chore collection of a household.
pub fn chores_collection(key: GroupKey) -> String {
    format!("groups/{}/chores", key)
}

/// Completion log collection of a household.
pub fn logs_collection(key: GroupKey) -> String {
    format!("groups/{}/logs", key)
}

/// Documents of one collection keyed by document id.
pub type Docs = BTreeMap<String, Document>;

/// The document database the core talks to.
///
/// Every write is atomic on its own; `update` and `delete_batch` are the
/// transactional primitives the voting and cascade paths rely on.
pub trait DocumentStore: Send + Sync {
    /// Creates a document. Fails with `WriteConflict` if the id is taken.
    fn insert(&self, collection: &str, id: &str, doc: Document) -> Result<()>;

    /// Overwrites an existing document. Fails with `NotFound` if absent.
    fn replace(&self, collection: &str, id: &str, doc: Document) -> Result<()>;

    /// Creates or overwrites a document.
    fn upsert(&self, collection: &str, id: &str, doc: Document) -> Result<()>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// Like `list`, paired with the collection's commit version. The version
    /// grows with every write committed through this store, so of two
    /// listings the one with the higher version is the more recent.
    fn list_versioned(&self, collection: &str) -> Result<(u64, Vec<(String, Document)>)>;

    /// Documents whose `field` equals `value`.
    fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<(String, Document)>> {
        Ok(self
            .list(collection)?
            .into_iter()
            .filter(|(_, doc)| doc.get(field) == Some(value))
            .collect())
    }

    /// Removes a document, returning whether it existed.
    fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Removes all `ids` or none of them.
    fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Read-modify-write of one document under exclusive access. Nothing is
    /// written if `f` returns an error.
    fn update(
        &self,
        collection: &str,
        id: &str,
        f: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<()>;

    /// Registers a callback fired after every committed write to `collection`.
    fn listen(&self, collection: &str, callback: ChangeCallback) -> ListenerId;

    fn unlisten(&self, id: ListenerId);
}

/// Low-level access a backend provides; [`DocumentStore`] is implemented on
/// top of it for every backend.
pub trait CollectionBackend: Send + Sync {
    /// Runs `f` on the committed documents and their version.
    fn read<T>(&self, collection: &str, f: impl FnOnce(u64, &Docs) -> T) -> Result<T>;

    /// Runs `f` with exclusive access. `f` returns its result and whether it
    /// modified the collection; only modified collections are persisted.
    fn write<T>(&self, collection: &str, f: impl FnOnce(&mut Docs) -> Result<(T, bool)>) -> Result<T>;

    fn listeners(&self) -> &Listeners;
}

impl<B: CollectionBackend> DocumentStore for B {
    fn insert(&self, collection: &str, id: &str, doc: Document) -> Result<()> {
        self.write(collection, |docs| {
            if docs.contains_key(id) {
                return Err(ChoreError::WriteConflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
            docs.insert(id.to_string(), doc);
            Ok(((), true))
        })?;
        self.listeners().notify(collection);
        Ok(())
    }

    fn replace(&self, collection: &str, id: &str, doc: Document) -> Result<()> {
        self.write(collection, |docs| match docs.get_mut(id) {
            Some(existing) => {
                *existing = doc;
                Ok(((), true))
            }
            None => Err(ChoreError::not_found(collection, id)),
        })?;
        self.listeners().notify(collection);
        Ok(())
    }

    fn upsert(&self, collection: &str, id: &str, doc: Document) -> Result<()> {
        self.write(collection, |docs| {
            docs.insert(id.to_string(), doc);
            Ok(((), true))
        })?;
        self.listeners().notify(collection);
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.read(collection, |_, docs| docs.get(id).cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        Ok(self.list_versioned(collection)?.1)
    }

    fn list_versioned(&self, collection: &str) -> Result<(u64, Vec<(String, Document)>)> {
        self.read(collection, |version, docs| {
            let docs = docs.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect();
            (version, docs)
        })
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let existed = self.write(collection, |docs| {
            let existed = docs.remove(id).is_some();
            Ok((existed, existed))
        })?;
        if existed {
            self.listeners().notify(collection);
        }
        Ok(existed)
    }

    fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.write(collection, |docs| {
            if let Some(missing) = ids.iter().find(|id| !docs.contains_key(id.as_str())) {
                return Err(ChoreError::not_found(collection, missing));
            }
            let mut removed = 0;
            for id in ids {
                if docs.remove(id).is_some() {
                    removed += 1;
                }
            }
            Ok((removed, true))
        })?;
        self.listeners().notify(collection);
        Ok(removed)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        f: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<()> {
        let changed = self.write(collection, |docs| {
            let existing = docs
                .get_mut(id)
                .ok_or_else(|| ChoreError::not_found(collection, id))?;
            let mut working = existing.clone();
            f(&mut working)?;
            let changed = working != *existing;
            *existing = working;
            Ok((changed, changed))
        })?;
        if changed {
            self.listeners().notify(collection);
        }
        Ok(())
    }

    fn listen(&self, collection: &str, callback: ChangeCallback) -> ListenerId {
        self.listeners().add(collection, callback)
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners().remove(id);
    }
}

/// In-process backend. Share one instance through an `Arc` to model several
/// devices of one household talking to the same database.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Versioned>>,
    listeners: Listeners,
}

#[derive(Default)]
struct Versioned {
    version: u64,
    docs: Docs,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionBackend for MemoryStore {
    fn read<T>(&self, collection: &str, f: impl FnOnce(u64, &Docs) -> T) -> Result<T> {
        let collections = self.collections.lock()?;
        Ok(match collections.get(collection) {
            Some(c) => f(c.version, &c.docs),
            None => f(0, &Docs::new()),
        })
    }

    fn write<T>(&self, collection: &str, f: impl FnOnce(&mut Docs) -> Result<(T, bool)>) -> Result<T> {
        let mut collections = self.collections.lock()?;
        let entry = collections.entry(collection.to_string()).or_default();
        let mut working = entry.docs.clone();
        let (result, changed) = f(&mut working)?;
        if changed {
            entry.docs = working;
            entry.version += 1;
            debug!(collection, version = entry.version, "memory store write committed");
        }
        Ok(result)
    }

    fn listeners(&self) -> &Listeners {
        &self.listeners
    }
}

/// Backend persisting each collection as a pretty-printed JSON file under a
/// root directory, e.g. `<root>/groups/123456/chores.json`.
///
/// Several processes may open the same root. Writes hold an exclusive lock
/// on `<root>/.lock` from load to rename, reads a shared one.
pub struct JsonFileStore {
    root: PathBuf,
    /// Commit versions of the collections this handle wrote.
    versions: Mutex<HashMap<String, u64>>,
    listeners: Listeners,
}

/// OS advisory lock on the store's lock file, released on drop.
struct RootLock(File);

impl RootLock {
    fn acquire(root: &Path, exclusive: bool) -> Result<Self> {
        fs::create_dir_all(root)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(Self(file))
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

const LOCK_FILE: &str = ".lock";

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            versions: Mutex::new(HashMap::new()),
            listeners: Listeners::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deletes every collection file under the root.
    pub fn destroy(&self) -> Result<()> {
        let mut versions = self.versions.lock()?;
        if self.root.exists() {
            let _lock = RootLock::acquire(&self.root, true)?;
            fs::remove_dir_all(&self.root)?;
        }
        versions.clear();
        Ok(())
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        let mut p = self.root.clone();
        for segment in collection.split('/').filter(|s| !s.is_empty()) {
            p.push(segment);
        }
        p.set_extension("json");
        p
    }

    /// Loads a collection; a missing file is an empty collection, an
    /// unreadable one is a transport failure.
    fn load(&self, collection: &str) -> Result<Docs> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Docs::new());
        }
        let mut f = OpenOptions::new().read(true).open(&path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Docs::new());
        }
        serde_json::from_str(&s).map_err(|e| {
            warn!(path = %path.display(), error = %e, "collection file is not valid JSON");
            ChoreError::from(e)
        })
    }

    /// Writes to a uniquely named temp file beside the collection and
    /// renames it over the collection so a batch lands whole or not at all.
    fn save(&self, collection: &str, docs: &Docs) -> Result<()> {
        let path = self.collection_path(collection);
        let parent = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent)?;
        let s = serde_json::to_string_pretty(docs)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(s.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl CollectionBackend for JsonFileStore {
    fn read<T>(&self, collection: &str, f: impl FnOnce(u64, &Docs) -> T) -> Result<T> {
        let versions = self.versions.lock()?;
        let _lock = RootLock::acquire(&self.root, false)?;
        let docs = self.load(collection)?;
        Ok(f(versions.get(collection).copied().unwrap_or(0), &docs))
    }

    fn write<T>(&self, collection: &str, f: impl FnOnce(&mut Docs) -> Result<(T, bool)>) -> Result<T> {
        let mut versions = self.versions.lock()?;
        let _lock = RootLock::acquire(&self.root, true)?;
        let mut docs = self.load(collection)?;
        let (result, changed) = f(&mut docs)?;
        if changed {
            self.save(collection, &docs)?;
            let version = versions.entry(collection.to_string()).or_insert(0);
            *version += 1;
            debug!(collection, version = *version, "collection file written");
        }
        Ok(result)
    }

    fn listeners(&self) -> &Listeners {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_twice_conflicts() {
        let store = MemoryStore::new();
        store.insert("c", "a", doc(json!({ "x": 1 }))).unwrap();
        let err = store.insert("c", "a", doc(json!({ "x": 2 }))).unwrap_err();
        assert!(matches!(err, ChoreError::WriteConflict { .. }));
        assert_eq!(store.get("c", "a").unwrap().unwrap()["x"], json!(1));
    }

    #[test]
    fn replace_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.replace("c", "nope", Document::new()).unwrap_err();
        assert!(matches!(err, ChoreError::NotFound { .. }));
    }

    #[test]
    fn delete_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert("c", "a", Document::new()).unwrap();
        store.insert("c", "b", Document::new()).unwrap();
        let ids = vec!["a".to_string(), "missing".to_string()];
        assert!(store.delete_batch("c", &ids).is_err());
        assert_eq!(store.list("c").unwrap().len(), 2);

        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(store.delete_batch("c", &ids).unwrap(), 2);
        assert!(store.list("c").unwrap().is_empty());
    }

    #[test]
    fn failed_update_writes_nothing() {
        let store = MemoryStore::new();
        store.insert("c", "a", doc(json!({ "n": 1 }))).unwrap();
        let result = store.update("c", "a", &mut |d| {
            d.insert("n".into(), json!(2));
            Err(ChoreError::Transport("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.get("c", "a").unwrap().unwrap()["n"], json!(1));
    }

    #[test]
    fn listeners_fire_per_collection_until_removed() {
        let store = MemoryStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = store.listen("c", Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        store.insert("c", "a", Document::new()).unwrap();
        store.insert("other", "a", Document::new()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!store.delete("c", "missing").unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        store.unlisten(id);
        store.delete("c", "a").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn query_eq_matches_field() {
        let store = MemoryStore::new();
        store.insert("c", "a", doc(json!({ "seriesId": "s1" }))).unwrap();
        store.insert("c", "b", doc(json!({ "seriesId": "s2" }))).unwrap();
        let hits = store.query_eq("c", "seriesId", &json!("s1")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a");
    }

    #[test]
    fn json_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.insert("groups/7/chores", "a", doc(json!({ "Name": "Dishes" }))).unwrap();
        }
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(dir.path().join("groups").join("7").join("chores.json").exists());
        let got = store.get("groups/7/chores", "a").unwrap().unwrap();
        assert_eq!(got["Name"], json!("Dishes"));
    }

    #[test]
    fn version_grows_only_on_commit() {
        let store = MemoryStore::new();
        assert_eq!(store.list_versioned("c").unwrap().0, 0);
        store.insert("c", "a", doc(json!({ "n": 1 }))).unwrap();
        assert_eq!(store.list_versioned("c").unwrap().0, 1);
        assert!(store.insert("c", "a", Document::new()).is_err());
        assert!(!store.delete("c", "missing").unwrap());
        store.update("c", "a", &mut |_| Ok(())).unwrap();
        assert_eq!(store.list_versioned("c").unwrap().0, 1);
        store.update("c", "a", &mut |d| {
            d.insert("n".into(), json!(2));
            Ok(())
        })
        .unwrap();
        let (version, docs) = store.list_versioned("c").unwrap();
        assert_eq!(version, 2);
        assert_eq!(docs[0].1["n"], json!(2));
    }

    #[test]
    fn json_file_stores_on_one_root_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonFileStore::open(dir.path()).unwrap();
        let b = JsonFileStore::open(dir.path()).unwrap();
        std::thread::scope(|s| {
            for (prefix, store) in [("a", &a), ("b", &b)] {
                s.spawn(move || {
                    for n in 0..25 {
                        store.insert("c", &format!("{}{}", prefix, n), Document::new()).unwrap();
                    }
                });
            }
        });
        assert_eq!(a.list("c").unwrap().len(), 50);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "c.json" && name != LOCK_FILE)
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
    }

    #[test]
    fn json_file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("users.json"), "{ not json").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(store.list(USERS), Err(ChoreError::Serialization(_))));
    }
}
