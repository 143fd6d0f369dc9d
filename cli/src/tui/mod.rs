pub mod app;
pub mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use docket_core::Screen;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::info;

use crate::tui::app::{App, Mode};

pub fn run(screen: Screen) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(screen);
    let res = run_app(&mut terminal, &mut app);

    // Release the listener before the terminal comes back
    app.screen.stop();
    info!("screen closed");

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.sync();
        terminal.draw(|f| ui::draw(f, app))
            .map_err(|e| io::Error::other(e.to_string()))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.mode() {
            Mode::List => match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Char(' ') => app.toggle_selected(),
                KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
                KeyCode::Enter | KeyCode::Char('e') => app.edit_selected(),
                KeyCode::Char('a') | KeyCode::Char('+') => app.add(),
                _ => {}
            },
            Mode::Dialog => match key.code {
                KeyCode::Esc => app.cancel(),
                KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => app.save(),
                KeyCode::Tab | KeyCode::Down => app.focus_next(),
                KeyCode::BackTab | KeyCode::Up => app.focus_previous(),
                KeyCode::Enter => app.activate(),
                KeyCode::Backspace => app.delete_char(),
                KeyCode::Char(c) => app.input_char(c),
                _ => {}
            },
            Mode::Picker => match key.code {
                KeyCode::Esc => app.picker_dismiss(),
                KeyCode::Enter => app.picker_confirm(),
                KeyCode::Left | KeyCode::Char('h') => app.picker_days(-1),
                KeyCode::Right | KeyCode::Char('l') => app.picker_days(1),
                KeyCode::Up | KeyCode::Char('k') => app.picker_days(-7),
                KeyCode::Down | KeyCode::Char('j') => app.picker_days(7),
                KeyCode::PageUp | KeyCode::Char('<') => app.picker_months(-1),
                KeyCode::PageDown | KeyCode::Char('>') => app.picker_months(1),
                KeyCode::Char('[') => app.picker_years(-1),
                KeyCode::Char(']') => app.picker_years(1),
                _ => {}
            },
        }
    }
}
