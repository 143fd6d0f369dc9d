use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::store::document::{
    ordered, Document, DocumentStore, Listener, ListenerRegistration, ListenerSet, Query, StoreError,
};

// Outside the non-recursive watch, so taking a lock never wakes the watcher
const LOCK_DIR: &str = ".locks";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Record {
    id: String,
    fields: Document,
}

struct Shared {
    dir: PathBuf,
    // Serializes this instance's cycles and listener delivery; the lock file
    // serializes them against other instances on the same directory
    io: Mutex<HashMap<String, Vec<Record>>>,
    listeners: ListenerSet,
}

/// Document store persisted as one JSON file per collection.
///
/// With watching enabled, a rewrite of a collection file by another process
/// is pushed to this process's listeners as well.
pub struct FileDocumentStore {
    shared: Arc<Shared>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileDocumentStore {
    #[tracing::instrument]
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.join(LOCK_DIR))?;
        info!(dir = %dir.display(), "opened file document store");
        Ok(Self {
            shared: Arc::new(Shared {
                dir: dir.to_path_buf(),
                io: Mutex::new(HashMap::new()),
                listeners: ListenerSet::default(),
            }),
            watcher: Mutex::new(None),
        })
    }

    /// Starts watching the data directory for changes made by other processes.
    pub fn watch(&self) -> Result<(), StoreError> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let mut watcher = recommended_watcher(move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else { return };
            let Some(shared) = weak.upgrade() else { return };
            for path in &event.paths {
                if let Some(collection) = collection_of(path) {
                    shared.refresh(&collection);
                }
            }
        })
        .map_err(|e| StoreError::Unavailable(format!("cannot watch data directory: {e}")))?;
        watcher
            .watch(&self.shared.dir, RecursiveMode::NonRecursive)
            .map_err(|e| StoreError::Unavailable(format!("cannot watch data directory: {e}")))?;
        *self.watcher.lock() = Some(watcher);
        info!(dir = %self.shared.dir.display(), "watching for external changes");
        Ok(())
    }
}

fn collection_of(path: &Path) -> Option<String> {
    if path.extension().is_some_and(|e| e == "json") {
        path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
    } else {
        None
    }
}

impl Shared {
    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Exclusive advisory lock on `collection`, held until the handle is dropped.
    fn lock_collection(&self, collection: &str) -> Result<File, StoreError> {
        let path = self.dir.join(LOCK_DIR).join(format!("{collection}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock()?;
        Ok(file)
    }

    fn read_records(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let path = self.path_for(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let records = serde_json::from_reader(reader)?;
        Ok(records)
    }

    fn write_records(&self, collection: &str, records: &[Record]) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
        tmp.persist(self.path_for(collection)).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn mutate(
        &self,
        collection: &str,
        apply: impl FnOnce(&mut Vec<Record>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut seen = self.io.lock();
        let _guard = self.lock_collection(collection)?;
        let mut records = self.read_records(collection)?;
        apply(&mut records)?;
        self.write_records(collection, &records)?;

        self.listeners.notify(collection, &documents(&records));
        seen.insert(collection.to_string(), records);
        Ok(())
    }

    // Re-reads a collection after a filesystem event; our own writes are already known.
    fn refresh(&self, collection: &str) {
        let mut seen = self.io.lock();
        match self.read_records(collection) {
            Ok(records) => {
                if seen.get(collection) == Some(&records) {
                    return;
                }
                debug!(collection, "collection changed on disk");
                self.listeners.notify(collection, &documents(&records));
                seen.insert(collection.to_string(), records);
            }
            Err(StoreError::Serde(e)) => {
                // Half-written by another process; the next event will carry the final state
                debug!(collection, error = %e, "ignoring unreadable collection file");
            }
            Err(e) => {
                warn!(collection, error = %e, "failed to re-read collection");
                self.listeners.notify_error(collection, &e.to_string());
            }
        }
    }
}

fn documents(records: &[Record]) -> Vec<Document> {
    records.iter().map(|r| r.fields.clone()).collect()
}

impl DocumentStore for FileDocumentStore {
    fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        self.shared.mutate(collection, |records| {
            match records.iter_mut().find(|r| r.id == id) {
                Some(existing) => existing.fields = document,
                None => records.push(Record {
                    id: id.to_string(),
                    fields: document,
                }),
            }
            Ok(())
        })?;
        debug!(collection, id, "set document");
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.shared.mutate(collection, |records| {
            let existing = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            for (name, value) in fields {
                existing.fields.insert(name, value);
            }
            Ok(())
        })?;
        debug!(collection, id, "updated document");
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.shared.mutate(collection, |records| {
            records.retain(|r| r.id != id);
            Ok(())
        })?;
        debug!(collection, id, "deleted document");
        Ok(())
    }

    fn listen(&self, collection: &str, query: Query, listener: Listener) -> ListenerRegistration {
        let mut seen = self.shared.io.lock();
        let registration = self.shared.listeners.add(collection, query.clone(), Arc::clone(&listener));
        match self.shared.read_records(collection) {
            Ok(records) => {
                listener(Ok(ordered(&documents(&records), &query)));
                seen.insert(collection.to_string(), records);
            }
            Err(e) => {
                warn!(collection, error = %e, "initial read failed");
                listener(Err(e));
            }
        }
        registration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::{Direction, SnapshotResult};
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn by_created_desc() -> Query {
        Query::order_by("createdAt", Direction::Descending)
    }

    #[test]
    fn test_documents_persist_across_instances() {
        let dir = tempdir().unwrap();
        {
            let store = FileDocumentStore::open(dir.path()).unwrap();
            store.set("tasks", "a", doc(json!({ "id": "a", "createdAt": 1 }))).unwrap();
            store.set("tasks", "b", doc(json!({ "id": "b", "createdAt": 2 }))).unwrap();
            store.update("tasks", "a", doc(json!({ "isCompleted": true }))).unwrap();
            store.delete("tasks", "b").unwrap();
        }

        let store = FileDocumentStore::open(dir.path()).unwrap();
        let (tx, rx) = mpsc::channel();
        let _reg = store.listen(
            "tasks",
            Query::order_by("createdAt", Direction::Descending),
            Arc::new(move |snap: SnapshotResult| tx.send(snap.unwrap()).unwrap()),
        );
        let snap = rx.try_recv().unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0]["id"], "a");
        assert_eq!(snap[0]["isCompleted"], true);
    }

    #[test]
    fn test_listener_sees_local_writes_in_order() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        let (tx, rx) = mpsc::channel();
        let _reg = store.listen(
            "tasks",
            Query::order_by("createdAt", Direction::Descending),
            Arc::new(move |snap: SnapshotResult| tx.send(snap.unwrap()).unwrap()),
        );
        assert!(rx.try_recv().unwrap().is_empty());

        store.set("tasks", "old", doc(json!({ "createdAt": 10 }))).unwrap();
        store.set("tasks", "new", doc(json!({ "createdAt": 20 }))).unwrap();
        rx.try_recv().unwrap();
        let snap = rx.try_recv().unwrap();
        assert_eq!(snap[0]["createdAt"], 20);
        assert_eq!(snap[1]["createdAt"], 10);
    }

    #[test]
    fn test_update_missing_document_fails_without_writing() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        let err = store.update("tasks", "ghost", doc(json!({ "isCompleted": true }))).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!dir.path().join("tasks.json").exists());
    }

    #[test]
    fn test_corrupt_file_reports_listen_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("tasks.json"), "not json").unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();

        let (tx, rx) = mpsc::channel();
        let _reg = store.listen(
            "tasks",
            Query::order_by("createdAt", Direction::Descending),
            Arc::new(move |snap: SnapshotResult| tx.send(snap.is_err()).unwrap()),
        );
        assert!(rx.try_recv().unwrap());
    }

    #[test]
    fn test_two_instances_on_one_directory_keep_every_write() {
        let dir = tempdir().unwrap();
        let writers: Vec<_> = (0..2)
            .map(|n| {
                let store = FileDocumentStore::open(dir.path()).unwrap();
                thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("{n}-{i}");
                        store.set("tasks", &id, doc(json!({ "createdAt": i }))).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let store = FileDocumentStore::open(dir.path()).unwrap();
        assert_eq!(store.shared.read_records("tasks").unwrap().len(), 200);
    }

    #[test]
    fn test_refresh_delivers_only_real_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let store = FileDocumentStore::open(dir.path()).unwrap();
        let (tx, rx) = mpsc::channel();
        let _reg = store.listen(
            "tasks",
            by_created_desc(),
            Arc::new(move |snap: SnapshotResult| tx.send(snap.unwrap()).unwrap()),
        );
        rx.try_recv().unwrap();

        store.set("tasks", "a", doc(json!({ "createdAt": 1 }))).unwrap();
        rx.try_recv().unwrap();
        // Own write, already seen
        store.shared.refresh("tasks");
        assert!(rx.try_recv().is_err());

        fs::write(&path, "[{\"id\":").unwrap();
        store.shared.refresh("tasks");
        assert!(rx.try_recv().is_err());

        fs::write(
            &path,
            r#"[{"id":"a","fields":{"createdAt":1}},{"id":"b","fields":{"createdAt":2}}]"#,
        )
        .unwrap();
        store.shared.refresh("tasks");
        let snap = rx.try_recv().unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0]["createdAt"], 2);
    }

    #[test]
    fn test_watch_picks_up_writes_from_another_instance() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        store.watch().unwrap();

        let (tx, rx) = mpsc::channel();
        let _reg = store.listen(
            "tasks",
            by_created_desc(),
            Arc::new(move |snap: SnapshotResult| {
                if let Ok(docs) = snap {
                    let _ = tx.send(docs);
                }
            }),
        );
        assert!(rx.recv_timeout(WAIT).unwrap().is_empty());

        let other = FileDocumentStore::open(dir.path()).unwrap();
        other.set("tasks", "b", doc(json!({ "createdAt": 2 }))).unwrap();
        let snap = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0]["createdAt"], 2);

        store.set("tasks", "a", doc(json!({ "createdAt": 1 }))).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().len(), 2);
        // The watcher sees that rename too, but nothing changed since
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }

    #[test]
    fn test_collection_of_only_matches_json_files() {
        assert_eq!(collection_of(Path::new("/d/tasks.json")), Some("tasks".to_string()));
        assert_eq!(collection_of(Path::new("/d/.tmpXYZ")), None);
        assert_eq!(collection_of(Path::new("/d/docket.log")), None);
    }
}
