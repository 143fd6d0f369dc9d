use chrono::{Datelike, Months, NaiveDate};
use docket_core::{Emphasis, NoticeStyle, TaskForm};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::tui::app::{App, Focus, Mode};

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Footer/Help
        ])
        .split(size);

    let header = Paragraph::new("DOCKET")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(header, main_chunks[0]);

    if app.screen.list_visible() {
        draw_task_list(f, app, main_chunks[1]);
    }
    if app.screen.empty_state_visible() {
        draw_empty_state(f, main_chunks[1]);
    }

    draw_footer(f, app, main_chunks[2]);

    if let Some(form) = app.screen.dialog() {
        draw_dialog(f, form, app.focus, size);
        if let Some(picker) = form.picker() {
            draw_picker(f, picker.date(), size);
        }
    }

    draw_toast(f, app, size);
}

fn text_style(emphasis: Emphasis) -> Style {
    match emphasis {
        Emphasis::Full => Style::default(),
        Emphasis::Dimmed => Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
    }
}

fn draw_task_list(f: &mut Frame, app: &mut App, area: Rect) {
    let rows: Vec<Row> = app.screen.rows().into_iter().map(|row| {
        let style = text_style(row.emphasis);
        let check = if row.checked { "[x]" } else { "[ ]" };

        Row::new(vec![
            Span::styled(check, Style::default().fg(Color::Green)),
            Span::styled(row.title.to_string(), style.add_modifier(Modifier::BOLD)),
            Span::styled(row.deadline.to_string(), style),
            Span::styled(row.description.to_string(), style),
            Span::styled("✖", Style::default().fg(Color::Red)),
        ])
    }).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),  // Checkbox
            Constraint::Min(16),    // Title
            Constraint::Length(10), // Deadline
            Constraint::Min(10),    // Description
            Constraint::Length(1),  // Delete
        ]
    )
    .header(Row::new(vec!["", "Task", "Deadline", "Description", ""]).style(Style::default().fg(Color::Yellow)))
    .block(Block::default().title(" Tasks ").borders(Borders::ALL).border_type(BorderType::Rounded))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_empty_state(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No tasks yet", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled("Press a to add one", Style::default().fg(Color::DarkGray))),
    ];
    let placeholder = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().title(" Tasks ").borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(placeholder, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    // Snackbars take over the footer line
    if let Some(notice) = app.notice.as_ref().filter(|n| n.notification.style() == NoticeStyle::Snackbar) {
        let bar = Paragraph::new(notice.notification.to_string())
            .style(Style::default().fg(Color::Black).bg(Color::White));
        f.render_widget(bar, area);
        return;
    }

    let help = match app.mode() {
        Mode::List => "a: Add | space: Done | enter: Edit | d: Delete | j/k: Navigate | q: Quit",
        Mode::Dialog => "tab: Next field | enter: Select | ctrl-s: Save | esc: Cancel",
        Mode::Picker => "←/→: Day | ↑/↓: Week | PgUp/PgDn: Month | [/]: Year | enter: Pick | esc: Close",
    };
    let footer = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn field_block(label: &str, focused: bool) -> Block<'_> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .title(format!(" {} ", label))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
}

fn draw_dialog(f: &mut Frame, form: &TaskForm, focus: Focus, screen: Rect) {
    let area = centered(60, 15, screen);
    f.render_widget(Clear, area);

    let outer = Block::default()
        .title(format!(" {} ", form.heading()))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(1), // Title error
            Constraint::Length(3), // Description
            Constraint::Length(3), // Deadline
            Constraint::Length(1), // Buttons
        ])
        .split(inner);

    let title = Paragraph::new(form.title()).block(field_block("Title", focus == Focus::Title));
    f.render_widget(title, chunks[0]);

    if let Some(error) = form.title_error() {
        let error = Paragraph::new(error).style(Style::default().fg(Color::Red));
        f.render_widget(error, chunks[1]);
    }

    let description = Paragraph::new(form.description())
        .wrap(Wrap { trim: false })
        .block(field_block("Description", focus == Focus::Description));
    f.render_widget(description, chunks[2]);

    let deadline_text = if form.deadline_text().is_empty() {
        Span::styled("press enter to pick a date", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(form.deadline_text())
    };
    let deadline = Paragraph::new(Line::from(deadline_text))
        .block(field_block("Deadline", focus == Focus::Deadline));
    f.render_widget(deadline, chunks[3]);

    let button = |label: &'static str, focused: bool| {
        let style = if focused {
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Span::styled(label, style)
    };
    let buttons = Paragraph::new(Line::from(vec![
        button(" Save ", focus == Focus::Save),
        Span::raw("   "),
        button(" Cancel ", focus == Focus::Cancel),
    ]))
    .alignment(Alignment::Right);
    f.render_widget(buttons, chunks[4]);

    // Text cursor at the end of the focused input
    let cursor = match focus {
        Focus::Title => Some((chunks[0], form.title())),
        Focus::Description => Some((chunks[2], form.description())),
        _ => None,
    };
    if form.picker().is_none() {
        if let Some((field, text)) = cursor {
            let max_x = field.x + field.width.saturating_sub(2);
            let x = (field.x + 1).saturating_add(text.width() as u16).min(max_x);
            f.set_cursor_position((x, field.y + 1));
        }
    }
}

fn draw_picker(f: &mut Frame, date: NaiveDate, screen: Rect) {
    let area = centered(26, 12, screen);
    f.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(
            date.format("%B %Y").to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled("Mo Tu We Th Fr Sa Su", Style::default().fg(Color::Yellow))),
    ];
    lines.extend(month_grid(date));

    let picker = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title(" Deadline ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    f.render_widget(picker, area);
}

fn month_grid(date: NaiveDate) -> Vec<Line<'static>> {
    let Some(first) = date.with_day(1) else { return Vec::new() };
    let days_in_month = first
        .checked_add_months(Months::new(1))
        .map(|next| (next - first).num_days() as u32)
        .unwrap_or(31);
    let offset = first.weekday().num_days_from_monday() as usize;

    let blank = || vec![Span::raw("   ")];
    let mut cells: Vec<Vec<Span<'static>>> = (0..offset).map(|_| blank()).collect();
    for day in 1..=days_in_month {
        let style = if day == date.day() {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        cells.push(vec![Span::styled(format!("{:>2}", day), style), Span::raw(" ")]);
    }
    // Full weeks only, so centering keeps the columns aligned
    while cells.len() % 7 != 0 {
        cells.push(blank());
    }

    cells
        .chunks(7)
        .map(|week| Line::from(week.iter().flatten().cloned().collect::<Vec<_>>()))
        .collect()
}

fn draw_toast(f: &mut Frame, app: &App, screen: Rect) {
    let Some(notice) = app.notice.as_ref().filter(|n| n.notification.style() == NoticeStyle::Toast) else {
        return;
    };
    let text = notice.notification.to_string();
    let width = (text.width() as u16).saturating_add(4);
    let area = Rect {
        x: screen.x + screen.width.saturating_sub(width) / 2,
        y: screen.y + screen.height.saturating_sub(4),
        width: width.min(screen.width),
        height: 3.min(screen.height),
    };
    f.render_widget(Clear, area);
    let color = if notice.notification.is_error() { Color::Red } else { Color::Green };
    let toast = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).border_style(Style::default().fg(color)));
    f.render_widget(toast, area);
}
