use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::store::document::{
    ordered, Document, DocumentStore, Listener, ListenerRegistration, ListenerSet, Query, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Set,
    Update,
    Delete,
}

/// One committed write, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub kind: WriteKind,
    pub collection: String,
    pub id: String,
    /// Field names carried by the write, sorted. Empty for deletes.
    pub fields: Vec<String>,
}

#[derive(Default)]
struct State {
    // Vec keeps insertion order, which is the tie-break order for equal sort keys
    collections: HashMap<String, Vec<(String, Document)>>,
    writes: Vec<WriteRecord>,
    fail_next: Option<String>,
}

impl State {
    fn docs(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|c| c.iter().map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }

    fn take_failure(&mut self) -> Result<(), StoreError> {
        match self.fail_next.take() {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn record(&mut self, kind: WriteKind, collection: &str, id: &str, fields: &Document) {
        let mut names: Vec<String> = fields.keys().cloned().collect();
        names.sort();
        self.writes.push(WriteRecord {
            kind,
            collection: collection.to_string(),
            id: id.to_string(),
            fields: names,
        });
    }
}

/// Process-local document store.
///
/// Clones share the same data, so one instance can stand in for the backend
/// seen by several clients.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<State>>,
    listeners: ListenerSet,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next write fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    /// Reports a listen failure to every listener on `collection`.
    pub fn break_listeners(&self, collection: &str, message: &str) {
        let _state = self.state.lock();
        self.listeners.notify_error(collection, message);
    }

    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.state
            .lock()
            .collections
            .get(collection)
            .and_then(|c| c.iter().find(|(key, _)| key == id))
            .map(|(_, d)| d.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.take_failure()?;
        state.record(WriteKind::Set, collection, id, &document);

        let docs = state.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(key, _)| key == id) {
            Some((_, existing)) => *existing = document,
            None => docs.push((id.to_string(), document)),
        }
        debug!(collection, id, "set document");

        // Listeners run under the data lock so deliveries follow commit order
        self.listeners.notify(collection, &state.docs(collection));
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.take_failure()?;

        let existing = state
            .collections
            .get_mut(collection)
            .and_then(|c| c.iter_mut().find(|(key, _)| key == id))
            .map(|(_, d)| d)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for (name, value) in fields.clone() {
            existing.insert(name, value);
        }
        state.record(WriteKind::Update, collection, id, &fields);
        debug!(collection, id, fields = ?fields.keys().collect::<Vec<_>>(), "updated document");

        self.listeners.notify(collection, &state.docs(collection));
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.take_failure()?;
        state.record(WriteKind::Delete, collection, id, &Document::new());

        if let Some(docs) = state.collections.get_mut(collection) {
            docs.retain(|(key, _)| key != id);
        }
        debug!(collection, id, "deleted document");

        self.listeners.notify(collection, &state.docs(collection));
        Ok(())
    }

    fn listen(&self, collection: &str, query: Query, listener: Listener) -> ListenerRegistration {
        let state = self.state.lock();
        let first = ordered(&state.docs(collection), &query);
        let registration = self.listeners.add(collection, query, Arc::clone(&listener));
        listener(Ok(first));
        registration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::{Direction, SnapshotResult};
    use serde_json::json;
    use std::sync::mpsc;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn by_created_desc() -> Query {
        Query::order_by("createdAt", Direction::Descending)
    }

    #[test]
    fn test_listen_delivers_initial_and_ordered_updates() {
        let store = MemoryDocumentStore::new();
        store.set("tasks", "a", doc(json!({ "id": "a", "createdAt": 1 }))).unwrap();

        let (tx, rx) = mpsc::channel();
        let _reg = store.listen(
            "tasks",
            by_created_desc(),
            Arc::new(move |snap: SnapshotResult| tx.send(snap.unwrap()).unwrap()),
        );
        assert_eq!(rx.try_recv().unwrap().len(), 1);

        store.set("tasks", "b", doc(json!({ "id": "b", "createdAt": 2 }))).unwrap();
        let snap = rx.try_recv().unwrap();
        assert_eq!(snap[0]["id"], "b");
        assert_eq!(snap[1]["id"], "a");
    }

    #[test]
    fn test_update_merges_only_named_fields() {
        let store = MemoryDocumentStore::new();
        store
            .set("tasks", "a", doc(json!({ "id": "a", "title": "t", "isCompleted": false })))
            .unwrap();
        store.update("tasks", "a", doc(json!({ "isCompleted": true }))).unwrap();

        let stored = store.get("tasks", "a").unwrap();
        assert_eq!(stored["title"], "t");
        assert_eq!(stored["isCompleted"], true);

        let last = store.write_log().pop().unwrap();
        assert_eq!(last.kind, WriteKind::Update);
        assert_eq!(last.fields, vec!["isCompleted".to_string()]);
    }

    #[test]
    fn test_update_missing_document_fails() {
        let store = MemoryDocumentStore::new();
        let err = store.update("tasks", "nope", doc(json!({ "isCompleted": true }))).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_delete_missing_document_is_ok() {
        let store = MemoryDocumentStore::new();
        assert!(store.delete("tasks", "nope").is_ok());
    }

    #[test]
    fn test_fail_next_applies_once() {
        let store = MemoryDocumentStore::new();
        store.fail_next("offline");
        let err = store.set("tasks", "a", Document::new()).unwrap_err();
        assert_eq!(err.to_string(), "store unavailable: offline");
        assert!(store.set("tasks", "a", Document::new()).is_ok());
    }

    #[test]
    fn test_removed_registration_stops_delivery() {
        let store = MemoryDocumentStore::new();
        let (tx, rx) = mpsc::channel();
        let reg = store.listen("tasks", by_created_desc(), Arc::new(move |snap: SnapshotResult| {
            let _ = tx.send(snap.is_ok());
        }));
        assert!(rx.try_recv().unwrap());
        reg.remove();
        assert_eq!(store.listener_count(), 0);

        store.set("tasks", "a", Document::new()).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_other_collections_are_not_notified() {
        let store = MemoryDocumentStore::new();
        let (tx, rx) = mpsc::channel();
        let _reg = store.listen("tasks", by_created_desc(), Arc::new(move |_: SnapshotResult| {
            let _ = tx.send(());
        }));
        rx.try_recv().unwrap();

        store.set("notes", "a", Document::new()).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
