use std::fmt;

use chrono::NaiveDate;

use crate::model::task::Task;
use crate::time::{format_deadline, parse_deadline, DatePicker};

pub const TITLE_REQUIRED: &str = "Title must not be empty";

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create,
    Edit(Task),
}

/// Why a save was refused. Nothing reaches the store in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Reported on the title field itself.
    EmptyTitle,
    /// Reported as a transient notification.
    MissingDeadline,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyTitle => f.write_str(TITLE_REQUIRED),
            Rejection::MissingDeadline => f.write_str("Select a deadline first"),
        }
    }
}

/// The store call a valid form turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Create(Task),
    Replace(Task),
}

impl Submission {
    pub fn task(&self) -> &Task {
        match self {
            Submission::Create(task) | Submission::Replace(task) => task,
        }
    }
}

/// State of the create/edit dialog.
#[derive(Debug, Clone)]
pub struct TaskForm {
    mode: FormMode,
    title: String,
    description: String,
    deadline_text: String,
    selected_deadline: Option<String>,
    title_error: Option<&'static str>,
    picker: Option<DatePicker>,
}

impl TaskForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            title: String::new(),
            description: String::new(),
            deadline_text: String::new(),
            selected_deadline: None,
            title_error: None,
            picker: None,
        }
    }

    /// Pre-filled from `task`; its deadline counts as already selected.
    pub fn edit(task: Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            deadline_text: task.deadline.clone(),
            selected_deadline: Some(task.deadline.clone()).filter(|d| !d.is_empty()),
            title_error: None,
            picker: None,
            mode: FormMode::Edit(task),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn heading(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "New task",
            FormMode::Edit(_) => "Edit task",
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Editing the title clears its validation error.
    pub fn title_mut(&mut self) -> &mut String {
        self.title_error = None;
        &mut self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn description_mut(&mut self) -> &mut String {
        &mut self.description
    }

    pub fn deadline_text(&self) -> &str {
        &self.deadline_text
    }

    pub fn selected_deadline(&self) -> Option<&str> {
        self.selected_deadline.as_deref()
    }

    pub fn title_error(&self) -> Option<&'static str> {
        self.title_error
    }

    /// Opens the picker on `today` for a new task. An edit opens on the current
    /// selection instead, falling back to `today` when it does not parse.
    pub fn open_date_picker(&mut self, today: NaiveDate) {
        let seed = match self.mode {
            FormMode::Create => today,
            FormMode::Edit(_) => self
                .selected_deadline
                .as_deref()
                .and_then(|d| parse_deadline(d).ok())
                .unwrap_or(today),
        };
        self.picker = Some(DatePicker::new(seed));
    }

    pub fn picker(&self) -> Option<&DatePicker> {
        self.picker.as_ref()
    }

    pub fn picker_mut(&mut self) -> Option<&mut DatePicker> {
        self.picker.as_mut()
    }

    pub fn dismiss_picker(&mut self) {
        self.picker = None;
    }

    /// Takes the picker's date as the deadline and closes it.
    pub fn confirm_picker(&mut self) {
        if let Some(picker) = self.picker.take() {
            self.select_date(picker.date());
        }
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        let text = format_deadline(date);
        self.deadline_text = text.clone();
        self.selected_deadline = Some(text);
    }

    /// Validates and builds the store call. `new_id` is only consulted in create mode.
    pub fn submit(
        &mut self,
        new_id: impl FnOnce() -> String,
        now_millis: i64,
    ) -> Result<Submission, Rejection> {
        let title = self.title.trim().to_string();
        let description = self.description.trim().to_string();

        if title.is_empty() {
            self.title_error = Some(TITLE_REQUIRED);
            return Err(Rejection::EmptyTitle);
        }
        let Some(deadline) = self.selected_deadline.clone() else {
            return Err(Rejection::MissingDeadline);
        };

        Ok(match &self.mode {
            FormMode::Create => {
                Submission::Create(Task::new(new_id(), title, description, deadline, now_millis))
            }
            FormMode::Edit(original) => {
                Submission::Replace(original.with_details(title, description, deadline))
            }
        })
    }
}
