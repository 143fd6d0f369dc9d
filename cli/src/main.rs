mod commands;
mod logging;
mod tui;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use docket_core::config::default_dir;
use docket_core::{Config, Executor, Screen};

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "A live-synced to-do list", long_about = None)]
struct Cli {
    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Less log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,
    /// Config file (default: ~/.docket/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Data directory, overriding the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Open the Terminal User Interface
    Tui,
    /// List all tasks, newest first
    List,
    /// Add a new task (usage: add Buy milk --deadline tomorrow)
    Add {
        #[arg(required = true)]
        title: Vec<String>,
        /// D/M/YYYY, YYYY-MM-DD, today, tomorrow, +3d, fri, ...
        #[arg(short, long)]
        deadline: String,
        #[arg(short = 'm', long, default_value = "")]
        description: String,
    },
    /// Change a task's title, description or deadline
    Edit {
        /// Task id or a unique prefix of it
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short = 'm', long)]
        description: Option<String>,
        #[arg(short, long)]
        deadline: Option<String>,
    },
    /// Mark a task as done
    Done { id: String },
    /// Mark a task as not done
    Undo { id: String },
    /// Delete a task
    Rm { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    // Installed before the config is read so its events are kept
    let log_file = match command {
        Commands::Tui => Some(log_path(cli.data_dir.as_deref())?),
        _ => None,
    };
    logging::init_tracing(cli.verbose, cli.quiet, log_file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match command {
        Commands::Tui => {
            let screen = commands::open_screen(&config, Executor::Background)?;
            tui::run(screen)?;
        }
        Commands::List => {
            let screen = one_shot(config)?;
            commands::list(&screen);
        }
        Commands::Add { title, deadline, description } => {
            let mut screen = one_shot(config)?;
            commands::add(&mut screen, &title.join(" "), &description, &deadline)?;
        }
        Commands::Edit { id, title, description, deadline } => {
            let mut screen = one_shot(config)?;
            commands::edit(
                &mut screen,
                &id,
                title.as_deref(),
                description.as_deref(),
                deadline.as_deref(),
            )?;
        }
        Commands::Done { id } => commands::set_done(&mut one_shot(config)?, &id, true)?,
        Commands::Undo { id } => commands::set_done(&mut one_shot(config)?, &id, false)?,
        Commands::Rm { id } => commands::remove(&mut one_shot(config)?, &id)?,
    }
    Ok(())
}

/// The TUI log lives under `logs/`, away from the watched collection files.
fn log_path(data_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_dir()?,
    };
    Ok(dir.join("logs").join("docket.log"))
}

fn one_shot(mut config: Config) -> Result<Screen> {
    // A single command sees its own writes through the listener
    config.watch = false;
    commands::open_screen(&config, Executor::Inline)
}
