use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::task::{Task, FIELD_CREATED_AT, FIELD_IS_COMPLETED};
use crate::store::document::{
    Direction, Document, DocumentStore, ListenerRegistration, Query, SnapshotResult, StoreError,
};

pub const DEFAULT_COLLECTION: &str = "tasks";

/// Which write a completion refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { id: String },
    Replace { id: String },
    SetCompleted { id: String, value: bool },
    Remove { id: String },
}

/// Everything the store reports back to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Full collection, newest first.
    Snapshot(Vec<Task>),
    ListenFailed(String),
    /// Outcome of a write; the error is the backend's message.
    Completed {
        mutation: Mutation,
        result: Result<(), String>,
    },
}

/// Where writes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// On the calling thread. Outcomes still arrive through the event channel.
    Inline,
    /// On one worker thread, in submission order.
    Background,
}

type Job = Box<dyn FnOnce() + Send>;

struct Worker {
    jobs: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn() -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("docket-store".to_string())
            .spawn(move || {
                for job in queue {
                    job();
                }
            })
            .context("Failed to start store worker")?;
        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the queue lets the worker finish what was already submitted
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Live listen on the task collection. Released explicitly or on drop.
#[derive(Debug)]
pub struct Subscription {
    registration: ListenerRegistration,
}

impl Subscription {
    pub fn release(self) {
        info!("releasing task subscription");
        self.registration.remove();
    }
}

/// The application's only path to the task collection.
pub struct TaskStore {
    db: Arc<dyn DocumentStore>,
    collection: String,
    events: Sender<StoreEvent>,
    worker: Option<Worker>,
}

impl TaskStore {
    pub fn new(
        db: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        executor: Executor,
    ) -> Result<(Self, Receiver<StoreEvent>)> {
        let (events, rx) = mpsc::channel();
        let worker = match executor {
            Executor::Inline => None,
            Executor::Background => Some(Worker::spawn()?),
        };
        let store = Self {
            db,
            collection: collection.into(),
            events,
            worker,
        };
        Ok((store, rx))
    }

    /// Opens the newest-first listen over the whole collection.
    pub fn subscribe(&self) -> Subscription {
        let events = self.events.clone();
        let collection = self.collection.clone();
        let query = Query::order_by(FIELD_CREATED_AT, Direction::Descending);
        info!(collection = %collection, "subscribing to tasks");

        let registration = self.db.listen(
            &self.collection,
            query,
            Arc::new(move |snapshot: SnapshotResult| {
                let event = match snapshot {
                    Ok(docs) => StoreEvent::Snapshot(decode_tasks(&collection, docs)),
                    Err(e) => {
                        warn!(collection = %collection, error = %e, "listen failed");
                        StoreEvent::ListenFailed(e.to_string())
                    }
                };
                // Receiver gone means the screen is being torn down
                let _ = events.send(event);
            }),
        );
        Subscription { registration }
    }

    pub fn new_id(&self) -> String {
        self.db.new_id()
    }

    pub fn create(&self, task: Task) {
        let mutation = Mutation::Create { id: task.id.clone() };
        self.dispatch(mutation, move |db, collection| {
            db.set(collection, &task.id, encode_task(&task)?)
        });
    }

    pub fn replace(&self, task: Task) {
        let mutation = Mutation::Replace { id: task.id.clone() };
        self.dispatch(mutation, move |db, collection| {
            db.set(collection, &task.id, encode_task(&task)?)
        });
    }

    /// Partial update touching only `isCompleted`.
    pub fn set_completed(&self, id: &str, value: bool) {
        let mutation = Mutation::SetCompleted {
            id: id.to_string(),
            value,
        };
        let id = id.to_string();
        self.dispatch(mutation, move |db, collection| {
            let mut fields = Document::new();
            fields.insert(FIELD_IS_COMPLETED.to_string(), Value::Bool(value));
            db.update(collection, &id, fields)
        });
    }

    pub fn remove(&self, id: &str) {
        let mutation = Mutation::Remove { id: id.to_string() };
        let id = id.to_string();
        self.dispatch(mutation, move |db, collection| db.delete(collection, &id));
    }

    fn dispatch<F>(&self, mutation: Mutation, op: F)
    where
        F: FnOnce(&dyn DocumentStore, &str) -> Result<(), StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let collection = self.collection.clone();
        let events = self.events.clone();
        let pending = mutation.clone();

        let job = move || {
            let result = op(db.as_ref(), &collection);
            match &result {
                Ok(()) => debug!(?mutation, "write committed"),
                Err(e) => warn!(?mutation, error = %e, "write failed"),
            }
            let _ = events.send(StoreEvent::Completed {
                mutation,
                result: result.map_err(|e| e.to_string()),
            });
        };

        match self.worker.as_ref().and_then(|w| w.jobs.as_ref()) {
            None => job(),
            Some(jobs) => {
                if jobs.send(Box::new(job)).is_err() {
                    let _ = self.events.send(StoreEvent::Completed {
                        mutation: pending,
                        result: Err("store worker has stopped".to_string()),
                    });
                }
            }
        }
    }
}

fn encode_task(task: &Task) -> Result<Document, StoreError> {
    match serde_json::to_value(task)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Unavailable("task did not encode as an object".to_string())),
    }
}

fn decode_tasks(collection: &str, docs: Vec<Document>) -> Vec<Task> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<Task>(Value::Object(doc)) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(collection, error = %e, "skipping undecodable task document");
                None
            }
        })
        .collect()
}
