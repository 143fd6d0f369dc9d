use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::Receiver;

use tracing::{debug, info};

use crate::form::{Rejection, Submission, TaskForm};
use crate::model::task::Task;
use crate::presenter::{RowGesture, RowIntent, TaskAdapter, TaskRow};
use crate::store::task_store::{Mutation, StoreEvent, Subscription, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeStyle {
    /// Short-lived message box.
    Toast,
    /// Bar along the bottom of the screen.
    Snackbar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ListenFailed(String),
    DeadlineRequired,
    CreateFailed(String),
    TaskUpdated,
    UpdateFailed(String),
    StatusFailed(String),
    TaskDeleted,
    DeleteFailed(String),
}

impl Notification {
    pub fn style(&self) -> NoticeStyle {
        match self {
            Notification::TaskUpdated | Notification::TaskDeleted => NoticeStyle::Snackbar,
            _ => NoticeStyle::Toast,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Notification::TaskUpdated | Notification::TaskDeleted)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::ListenFailed(e) => write!(f, "Error: {}", e),
            Notification::DeadlineRequired => write!(f, "{}", Rejection::MissingDeadline),
            Notification::CreateFailed(e) => write!(f, "Failed to add task: {}", e),
            Notification::TaskUpdated => f.write_str("Task updated"),
            Notification::UpdateFailed(e) => write!(f, "Failed to update task: {}", e),
            Notification::StatusFailed(e) => write!(f, "Failed to update status: {}", e),
            Notification::TaskDeleted => f.write_str("Task deleted"),
            Notification::DeleteFailed(e) => write!(f, "Failed to delete task: {}", e),
        }
    }
}

/// The list screen: owns the subscription, the current snapshot and the open dialog.
///
/// Nothing here changes the task list except a snapshot; writes only ever
/// show up once the store redelivers.
pub struct Screen {
    store: TaskStore,
    events: Receiver<StoreEvent>,
    tasks: Vec<Task>,
    adapter: TaskAdapter,
    dialog: Option<TaskForm>,
    notifications: VecDeque<Notification>,
    subscription: Option<Subscription>,
    empty_state_visible: bool,
    list_visible: bool,
}

impl Screen {
    pub fn new(store: TaskStore, events: Receiver<StoreEvent>) -> Self {
        Self {
            store,
            events,
            tasks: Vec::new(),
            adapter: TaskAdapter::new(),
            dialog: None,
            notifications: VecDeque::new(),
            subscription: None,
            empty_state_visible: true,
            list_visible: false,
        }
    }

    pub fn start(&mut self) {
        if self.subscription.is_none() {
            self.subscription = Some(self.store.subscribe());
        }
    }

    /// Releases the subscription. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Applies every event already waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Snapshot(tasks) => {
                debug!(count = tasks.len(), "snapshot received");
                self.tasks = tasks;
                self.empty_state_visible = self.tasks.is_empty();
                self.list_visible = !self.tasks.is_empty();
                self.adapter.notify_data_set_changed();
            }
            StoreEvent::ListenFailed(message) => {
                self.notify(Notification::ListenFailed(message));
            }
            StoreEvent::Completed { mutation, result } => {
                let notice = match (mutation, result) {
                    // Create success is silent; edit and delete confirm
                    (Mutation::Create { .. }, Ok(())) => None,
                    (Mutation::Create { .. }, Err(e)) => Some(Notification::CreateFailed(e)),
                    (Mutation::Replace { .. }, Ok(())) => Some(Notification::TaskUpdated),
                    (Mutation::Replace { .. }, Err(e)) => Some(Notification::UpdateFailed(e)),
                    (Mutation::SetCompleted { .. }, Ok(())) => None,
                    (Mutation::SetCompleted { .. }, Err(e)) => Some(Notification::StatusFailed(e)),
                    (Mutation::Remove { .. }, Ok(())) => Some(Notification::TaskDeleted),
                    (Mutation::Remove { .. }, Err(e)) => Some(Notification::DeleteFailed(e)),
                };
                if let Some(notice) = notice {
                    self.notify(notice);
                }
            }
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn rows(&self) -> Vec<TaskRow<'_>> {
        self.adapter.rows(&self.tasks)
    }

    pub fn adapter(&self) -> &TaskAdapter {
        &self.adapter
    }

    pub fn empty_state_visible(&self) -> bool {
        self.empty_state_visible
    }

    pub fn list_visible(&self) -> bool {
        self.list_visible
    }

    /// The add affordance.
    pub fn press_add(&mut self) {
        self.dialog = Some(TaskForm::create());
    }

    pub fn row_gesture(&mut self, position: usize, gesture: RowGesture) {
        let Some(intent) = self.adapter.gesture(&self.tasks, position, gesture) else {
            return;
        };
        match intent {
            RowIntent::CheckChanged(task, checked) => self.store.set_completed(&task.id, checked),
            RowIntent::Delete(task) => self.store.remove(&task.id),
            RowIntent::Edit(task) => self.dialog = Some(TaskForm::edit(task)),
        }
    }

    pub fn dialog(&self) -> Option<&TaskForm> {
        self.dialog.as_ref()
    }

    pub fn dialog_mut(&mut self) -> Option<&mut TaskForm> {
        self.dialog.as_mut()
    }

    /// Validates the open dialog and issues its write. The dialog stays open
    /// when validation fails. Returns the written task's id, or `None` when
    /// no dialog is open.
    pub fn save_dialog(&mut self, now_millis: i64) -> Result<Option<String>, Rejection> {
        let store = &self.store;
        let Some(form) = self.dialog.as_mut() else {
            return Ok(None);
        };

        match form.submit(|| store.new_id(), now_millis) {
            Ok(submission) => {
                let id = submission.task().id.clone();
                match submission {
                    Submission::Create(task) => {
                        info!(id = %task.id, "creating task");
                        store.create(task);
                    }
                    Submission::Replace(task) => {
                        info!(id = %task.id, "replacing task");
                        store.replace(task);
                    }
                }
                self.dialog = None;
                Ok(Some(id))
            }
            Err(rejection) => {
                if rejection == Rejection::MissingDeadline {
                    self.notify(Notification::DeadlineRequired);
                }
                Err(rejection)
            }
        }
    }

    pub fn cancel_dialog(&mut self) {
        self.dialog = None;
    }

    pub fn next_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    fn notify(&mut self, notification: Notification) {
        debug!(%notification, "notify");
        self.notifications.push_back(notification);
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDocumentStore;
    use crate::store::task_store::{Executor, DEFAULT_COLLECTION};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn screen(db: &MemoryDocumentStore) -> Screen {
        let (store, rx) =
            TaskStore::new(Arc::new(db.clone()), DEFAULT_COLLECTION, Executor::Inline).unwrap();
        let mut screen = Screen::new(store, rx);
        screen.start();
        screen.pump();
        screen
    }

    fn add(screen: &mut Screen, title: &str, now: i64) {
        screen.press_add();
        let form = screen.dialog_mut().unwrap();
        form.title_mut().push_str(title);
        form.select_date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        screen.save_dialog(now).unwrap();
        screen.pump();
    }

    #[test]
    fn test_empty_state_tracks_snapshot() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        assert!(screen.empty_state_visible());
        assert!(!screen.list_visible());

        add(&mut screen, "One", 1);
        assert!(!screen.empty_state_visible());
        assert!(screen.list_visible());

        screen.row_gesture(0, RowGesture::Delete);
        screen.pump();
        assert!(screen.empty_state_visible());
        assert!(!screen.list_visible());
    }

    #[test]
    fn test_snapshot_bumps_render_generation() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        let before = screen.adapter().generation();
        add(&mut screen, "One", 1);
        assert!(screen.adapter().generation() > before);
    }

    #[test]
    fn test_list_waits_for_redelivery() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        screen.press_add();
        let form = screen.dialog_mut().unwrap();
        form.title_mut().push_str("Later");
        form.select_date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        screen.save_dialog(10).unwrap();

        // Written, but not yet pumped
        assert!(screen.tasks().is_empty());
        screen.pump();
        assert_eq!(screen.tasks().len(), 1);
    }

    #[test]
    fn test_create_is_silent_and_edit_confirms() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        add(&mut screen, "One", 1);
        assert!(screen.take_notifications().is_empty());

        screen.row_gesture(0, RowGesture::Body);
        screen.dialog_mut().unwrap().title_mut().push_str("!");
        screen.save_dialog(2).unwrap();
        screen.pump();
        assert_eq!(screen.take_notifications(), vec![Notification::TaskUpdated]);
        assert_eq!(screen.tasks()[0].title, "One!");
    }

    #[test]
    fn test_rejected_save_keeps_dialog_open() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        screen.press_add();
        screen.dialog_mut().unwrap().title_mut().push_str("No date");

        assert_eq!(screen.save_dialog(1), Err(Rejection::MissingDeadline));
        assert!(screen.dialog().is_some());
        assert_eq!(screen.next_notification(), Some(Notification::DeadlineRequired));
        assert!(db.write_log().is_empty());

        screen.cancel_dialog();
        assert!(screen.dialog().is_none());
        assert_eq!(screen.save_dialog(1), Ok(None));
    }

    #[test]
    fn test_failures_map_to_notifications() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        add(&mut screen, "One", 1);

        db.fail_next("offline");
        screen.row_gesture(0, RowGesture::Checkbox(true));
        db.fail_next("offline");
        screen.row_gesture(0, RowGesture::Delete);
        screen.pump();

        let notices = screen.take_notifications();
        assert_eq!(
            notices,
            vec![
                Notification::StatusFailed("store unavailable: offline".into()),
                Notification::DeleteFailed("store unavailable: offline".into()),
            ]
        );
        assert!(notices.iter().all(|n| n.style() == NoticeStyle::Toast));
        assert_eq!(screen.tasks().len(), 1);
        assert!(!screen.tasks()[0].is_completed);
    }

    #[test]
    fn test_listen_failure_keeps_last_snapshot() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        add(&mut screen, "One", 1);

        db.break_listeners("tasks", "permission denied");
        screen.pump();
        assert_eq!(screen.tasks().len(), 1);
        assert_eq!(
            screen.next_notification().map(|n| n.to_string()),
            Some("Error: store unavailable: permission denied".to_string())
        );
    }

    #[test]
    fn test_stop_releases_listener() {
        let db = MemoryDocumentStore::new();
        let mut screen = screen(&db);
        assert_eq!(db.listener_count(), 1);
        screen.stop();
        screen.stop();
        assert!(!screen.is_subscribed());
        assert_eq!(db.listener_count(), 0);

        let again = self::screen(&db);
        assert_eq!(db.listener_count(), 1);
        drop(again);
        assert_eq!(db.listener_count(), 0);
    }
}
