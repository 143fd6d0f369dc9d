//! Projection of the task list onto list rows.

use crate::model::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Full,
    /// Completed tasks: title, description and deadline all fade.
    Dimmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub deadline: &'a str,
    pub checked: bool,
    pub emphasis: Emphasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowGesture {
    /// Checkbox tapped; carries the box's new state.
    Checkbox(bool),
    Delete,
    /// Anywhere else on the row.
    Body,
}

/// Which per-row handler a gesture fired, with the row's task.
#[derive(Debug, Clone, PartialEq)]
pub enum RowIntent {
    CheckChanged(Task, bool),
    Delete(Task),
    Edit(Task),
}

/// Stateless over the list it is handed. The generation counter only
/// records that a full re-render was requested.
#[derive(Debug, Default)]
pub struct TaskAdapter {
    generation: u64,
}

impl TaskAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows<'a>(&self, tasks: &'a [Task]) -> Vec<TaskRow<'a>> {
        tasks.iter().map(row_for).collect()
    }

    pub fn gesture(&self, tasks: &[Task], position: usize, gesture: RowGesture) -> Option<RowIntent> {
        let task = tasks.get(position)?.clone();
        Some(match gesture {
            RowGesture::Checkbox(checked) => RowIntent::CheckChanged(task, checked),
            RowGesture::Delete => RowIntent::Delete(task),
            RowGesture::Body => RowIntent::Edit(task),
        })
    }

    pub fn notify_data_set_changed(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn row_for(task: &Task) -> TaskRow<'_> {
    TaskRow {
        title: &task.title,
        description: &task.description,
        deadline: &task.deadline,
        checked: task.is_completed,
        emphasis: if task.is_completed {
            Emphasis::Dimmed
        } else {
            Emphasis::Full
        },
    }
}
