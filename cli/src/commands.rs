use anyhow::{anyhow, bail, Context, Result};
use docket_core::{
    now_millis, parse_human_date, today, Config, Executor, RowGesture, Screen, TaskStore,
};
use tabled::settings::object::Rows;
use tabled::settings::{Color, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TaskLine {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Done")]
    done: &'static str,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn open_screen(config: &Config, executor: Executor) -> Result<Screen> {
    let db = config.open_store()?;
    let (store, events) = TaskStore::new(db, config.collection.clone(), executor)?;
    let mut screen = Screen::new(store, events);
    screen.start();
    screen.pump();
    Ok(screen)
}

pub fn list(screen: &Screen) {
    if screen.empty_state_visible() {
        println!("No tasks yet. Add one with `docket add <title> --deadline <date>`.");
        return;
    }

    let lines: Vec<TaskLine> = screen
        .tasks()
        .iter()
        .map(|task| TaskLine {
            id: short_id(&task.id).to_string(),
            done: if task.is_completed { "[x]" } else { "[ ]" },
            title: task.title.clone(),
            deadline: task.deadline.clone(),
            description: task.description.clone(),
        })
        .collect();

    let mut table = Table::new(lines);
    table
        .with(Style::modern())
        .with(Modify::new(Rows::first()).with(Color::FG_CYAN)); // Header color
    for (i, row) in screen.rows().iter().enumerate() {
        if row.emphasis == docket_core::Emphasis::Dimmed {
            table.with(Modify::new(Rows::one(i + 1)).with(Color::FG_BRIGHT_BLACK));
        }
    }
    println!("{}", table);
}

pub fn add(screen: &mut Screen, title: &str, description: &str, deadline: &str) -> Result<()> {
    let date = parse_human_date(deadline, today())
        .with_context(|| format!("Invalid deadline '{}'", deadline))?;

    screen.press_add();
    if let Some(form) = screen.dialog_mut() {
        form.title_mut().push_str(title);
        form.description_mut().push_str(description);
        form.select_date(date);
    }
    let id = save(screen)?;
    finish(screen)?;
    println!("Task added: {} (ID: {})", title.trim(), short_id(&id));
    Ok(())
}

pub fn edit(
    screen: &mut Screen,
    id: &str,
    title: Option<&str>,
    description: Option<&str>,
    deadline: Option<&str>,
) -> Result<()> {
    let date = deadline
        .map(|d| parse_human_date(d, today()).with_context(|| format!("Invalid deadline '{}'", d)))
        .transpose()?;

    let position = position_of(screen, id)?;
    screen.row_gesture(position, RowGesture::Body);
    if let Some(form) = screen.dialog_mut() {
        if let Some(title) = title {
            *form.title_mut() = title.to_string();
        }
        if let Some(description) = description {
            *form.description_mut() = description.to_string();
        }
        if let Some(date) = date {
            form.select_date(date);
        }
    }
    save(screen)?;
    finish(screen)
}

pub fn set_done(screen: &mut Screen, id: &str, done: bool) -> Result<()> {
    let position = position_of(screen, id)?;
    let full_id = screen.tasks()[position].id.clone();
    screen.row_gesture(position, RowGesture::Checkbox(done));
    finish(screen)?;
    let label = if done { "done" } else { "not done" };
    println!("Marked {} as {}", short_id(&full_id), label);
    Ok(())
}

pub fn remove(screen: &mut Screen, id: &str) -> Result<()> {
    let position = position_of(screen, id)?;
    screen.row_gesture(position, RowGesture::Delete);
    finish(screen)
}

fn save(screen: &mut Screen) -> Result<String> {
    match screen.save_dialog(now_millis()) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(anyhow!("No dialog is open")),
        Err(rejection) => {
            // The deadline notice duplicates the rejection itself
            screen.take_notifications();
            Err(anyhow!("{}", rejection))
        }
    }
}

/// Applies the outcome of the last write and reports its notification.
fn finish(screen: &mut Screen) -> Result<()> {
    screen.pump();
    let mut failure = None;
    for notice in screen.take_notifications() {
        if notice.is_error() {
            failure.get_or_insert(notice);
        } else {
            println!("{}", notice);
        }
    }
    match failure {
        Some(notice) => bail!("{}", notice),
        None => Ok(()),
    }
}

fn position_of(screen: &Screen, id: &str) -> Result<usize> {
    let matches: Vec<usize> = screen
        .tasks()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.id.starts_with(id))
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No task with ID '{}'", id)),
        [one] => Ok(*one),
        _ => Err(anyhow!("Ambiguous ID '{}' matches {} tasks", id, matches.len())),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
