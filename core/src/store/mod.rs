pub mod document;
pub mod file;
pub mod memory;
pub mod task_store;

// Re-export
pub use document::{
    Direction, Document, DocumentStore, Listener, ListenerRegistration, Query, SnapshotResult,
    StoreError,
};
pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;
pub use task_store::{Executor, Mutation, StoreEvent, Subscription, TaskStore, DEFAULT_COLLECTION};
