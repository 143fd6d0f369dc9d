use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

pub type SnapshotResult = Result<Vec<Document>, StoreError>;

/// Receives the ordered collection on every change, or the reason listening failed.
pub type Listener = Arc<dyn Fn(SnapshotResult) + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} does not exist")]
    NotFound { collection: String, id: String },
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document data: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Whole-collection query: one ordering field, no filters, no paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub order_by: String,
    pub direction: Direction,
}

impl Query {
    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            order_by: field.into(),
            direction,
        }
    }

    /// Stable sort, so documents with equal keys keep the backend's order.
    pub fn apply(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| {
            let ord = compare_field(a.get(&self.order_by), b.get(&self.order_by));
            match self.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
}

// Missing fields sort before any value; numbers before strings.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// A collection-oriented document database.
///
/// Writes are serialized by the implementation. Listeners observe every
/// committed change in commit order and receive the full ordered collection.
pub trait DocumentStore: Send + Sync {
    /// A fresh document id, unique across clients.
    fn new_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Creates or fully overwrites the document at `id`.
    fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

    /// Merges `fields` into the existing document at `id`, leaving other fields alone.
    fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    /// Removes the document. Removing a missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Delivers the current collection right away, then again after every change,
    /// until the returned registration is removed or dropped.
    fn listen(&self, collection: &str, query: Query, listener: Listener) -> ListenerRegistration;
}

/// Handle on an open listen. Dropping it detaches the listener.
#[must_use = "dropping the registration stops the listener"]
pub struct ListenerRegistration {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.release.is_some())
            .finish()
    }
}

struct Entry {
    collection: String,
    query: Query,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<u64, Entry>,
}

/// Listener bookkeeping shared by the backends.
#[derive(Clone, Default)]
pub(crate) struct ListenerSet {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerSet {
    pub(crate) fn add(&self, collection: &str, query: Query, listener: Listener) -> ListenerRegistration {
        let id = {
            let mut registry = self.inner.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.insert(
                id,
                Entry {
                    collection: collection.to_string(),
                    query,
                    listener,
                },
            );
            id
        };

        let weak = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().entries.remove(&id);
            }
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Pushes `docs` (in backend order) to every listener on `collection`.
    pub(crate) fn notify(&self, collection: &str, docs: &[Document]) {
        for (query, listener) in self.matching(collection) {
            listener(Ok(ordered(docs, &query)));
        }
    }

    pub(crate) fn notify_error(&self, collection: &str, message: &str) {
        for (_, listener) in self.matching(collection) {
            listener(Err(StoreError::Unavailable(message.to_string())));
        }
    }

    // Callbacks run outside the registry lock so they may drop registrations.
    fn matching(&self, collection: &str) -> Vec<(Query, Listener)> {
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| e.collection == collection)
            .map(|e| (e.query.clone(), Arc::clone(&e.listener)))
            .collect()
    }
}

pub(crate) fn ordered(docs: &[Document], query: &Query) -> Vec<Document> {
    let mut docs = docs.to_vec();
    query.apply(&mut docs);
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_query_orders_descending_and_keeps_ties_stable() {
        let mut docs = vec![
            doc(json!({ "k": "a", "createdAt": 1 })),
            doc(json!({ "k": "b", "createdAt": 3 })),
            doc(json!({ "k": "c", "createdAt": 2 })),
            doc(json!({ "k": "d", "createdAt": 3 })),
        ];
        Query::order_by("createdAt", Direction::Descending).apply(&mut docs);
        let keys: Vec<&str> = docs.iter().map(|d| d["k"].as_str().unwrap()).collect();
        // Reversing a stable comparator keeps b before d
        assert_eq!(keys, vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn test_missing_order_field_sorts_first_ascending() {
        let mut docs = vec![doc(json!({ "createdAt": 5 })), doc(json!({}))];
        Query::order_by("createdAt", Direction::Ascending).apply(&mut docs);
        assert!(docs[0].get("createdAt").is_none());
    }

    #[test]
    fn test_registration_drop_detaches_listener() {
        let set = ListenerSet::default();
        let reg = set.add(
            "tasks",
            Query::order_by("createdAt", Direction::Descending),
            Arc::new(|_: SnapshotResult| {}),
        );
        assert_eq!(set.len(), 1);
        drop(reg);
        assert_eq!(set.len(), 0);
    }
}
