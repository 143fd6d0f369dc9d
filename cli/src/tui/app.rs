use std::time::{Duration, Instant};

use docket_core::{
    now_millis, today, NoticeStyle, Notification, Rejection, RowGesture, Screen, TaskForm,
};
use ratatui::widgets::TableState;

const TOAST_TTL: Duration = Duration::from_secs(2);
const SNACKBAR_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    List,
    Dialog,
    Picker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Title,
    Description,
    Deadline,
    Save,
    Cancel,
}

impl Focus {
    const ORDER: [Focus; 5] = [
        Focus::Title,
        Focus::Description,
        Focus::Deadline,
        Focus::Save,
        Focus::Cancel,
    ];

    fn step(self, forward: bool) -> Focus {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        Self::ORDER[next]
    }
}

pub struct Notice {
    pub notification: Notification,
    shown_at: Instant,
}

impl Notice {
    fn expired(&self) -> bool {
        let ttl = match self.notification.style() {
            NoticeStyle::Toast => TOAST_TTL,
            NoticeStyle::Snackbar => SNACKBAR_TTL,
        };
        self.shown_at.elapsed() >= ttl
    }
}

pub struct App {
    pub screen: Screen,
    pub state: TableState,
    pub focus: Focus,
    pub notice: Option<Notice>,
}

impl App {
    pub fn new(screen: Screen) -> App {
        let mut app = App {
            screen,
            state: TableState::default(),
            focus: Focus::Title,
            notice: None,
        };
        app.sync();
        app
    }

    pub fn mode(&self) -> Mode {
        match self.screen.dialog() {
            None => Mode::List,
            Some(form) if form.picker().is_some() => Mode::Picker,
            Some(_) => Mode::Dialog,
        }
    }

    /// Applies pending store events and advances the notification queue.
    pub fn sync(&mut self) {
        if self.screen.pump() > 0 {
            self.clamp_selection();
        }
        if self.notice.as_ref().is_none_or(Notice::expired) {
            self.notice = self.screen.next_notification().map(|notification| Notice {
                notification,
                shown_at: Instant::now(),
            });
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.screen.tasks().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            None => self.state.select(Some(0)),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            Some(_) => {}
        }
    }

    pub fn next(&mut self) {
        let len = self.screen.tasks().len();
        if len == 0 { return; }

        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.screen.tasks().len();
        if len == 0 { return; }

        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    // List gestures. The list itself only changes when the next snapshot lands.

    pub fn toggle_selected(&mut self) {
        if let Some(i) = self.state.selected() {
            if let Some(task) = self.screen.tasks().get(i) {
                let checked = !task.is_completed;
                self.screen.row_gesture(i, RowGesture::Checkbox(checked));
            }
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(i) = self.state.selected() {
            self.screen.row_gesture(i, RowGesture::Delete);
        }
    }

    pub fn edit_selected(&mut self) {
        if let Some(i) = self.state.selected() {
            self.screen.row_gesture(i, RowGesture::Body);
            self.focus = Focus::Title;
        }
    }

    pub fn add(&mut self) {
        self.screen.press_add();
        self.focus = Focus::Title;
    }

    // Dialog

    pub fn focus_next(&mut self) {
        self.focus = self.focus.step(true);
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.focus.step(false);
    }

    fn form(&mut self) -> Option<&mut TaskForm> {
        self.screen.dialog_mut()
    }

    pub fn input_char(&mut self, c: char) {
        let focus = self.focus;
        if let Some(form) = self.form() {
            match focus {
                Focus::Title => form.title_mut().push(c),
                Focus::Description => form.description_mut().push(c),
                _ => {}
            }
        }
    }

    pub fn delete_char(&mut self) {
        let focus = self.focus;
        if let Some(form) = self.form() {
            match focus {
                Focus::Title => {
                    form.title_mut().pop();
                }
                Focus::Description => {
                    form.description_mut().pop();
                }
                _ => {}
            }
        }
    }

    /// Enter inside the dialog.
    pub fn activate(&mut self) {
        match self.focus {
            Focus::Title | Focus::Description => self.focus_next(),
            Focus::Deadline => {
                if let Some(form) = self.form() {
                    form.open_date_picker(today());
                }
            }
            Focus::Save => self.save(),
            Focus::Cancel => self.cancel(),
        }
    }

    pub fn save(&mut self) {
        match self.screen.save_dialog(now_millis()) {
            Ok(_) => self.sync(),
            Err(Rejection::EmptyTitle) => self.focus = Focus::Title,
            Err(Rejection::MissingDeadline) => {
                self.focus = Focus::Deadline;
                self.sync();
            }
        }
    }

    pub fn cancel(&mut self) {
        self.screen.cancel_dialog();
    }

    // Date picker

    pub fn picker_days(&mut self, days: i64) {
        if let Some(picker) = self.form().and_then(|f| f.picker_mut()) {
            picker.shift_days(days);
        }
    }

    pub fn picker_months(&mut self, months: i32) {
        if let Some(picker) = self.form().and_then(|f| f.picker_mut()) {
            picker.shift_months(months);
        }
    }

    pub fn picker_years(&mut self, years: i32) {
        if let Some(picker) = self.form().and_then(|f| f.picker_mut()) {
            picker.shift_years(years);
        }
    }

    pub fn picker_confirm(&mut self) {
        if let Some(form) = self.form() {
            form.confirm_picker();
        }
        self.focus = Focus::Save;
    }

    pub fn picker_dismiss(&mut self) {
        if let Some(form) = self.form() {
            form.dismiss_picker();
        }
    }
}
