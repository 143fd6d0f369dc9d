pub mod config;
pub mod form;
pub mod model;
pub mod presenter;
pub mod screen;
pub mod store;
pub mod time;

pub use config::{Backend, Config};
pub use form::{FormMode, Rejection, Submission, TaskForm};
pub use model::task::Task;
pub use presenter::{Emphasis, RowGesture, RowIntent, TaskAdapter, TaskRow};
pub use screen::{NoticeStyle, Notification, Screen};
pub use store::{
    DocumentStore, Executor, FileDocumentStore, MemoryDocumentStore, Mutation, StoreEvent,
    Subscription, TaskStore,
};
pub use time::{format_deadline, now_millis, parse_deadline, parse_human_date, today, DatePicker};
