use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, GridVariant, CONFIG_ENV, DATA_ENV};
use crate::schedule::ScheduleStore;
use crate::storage;

pub mod commands;

use self::commands::{ClearArgs, SetArgs, ShowArgs};

#[derive(Parser, Debug)]
#[command(
    name = "timetable",
    version,
    about = "Half-hour timetable editor for the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over TIMETABLE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over TIMETABLE_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Grid layout to edit; defaults to the configured variant
    #[arg(long, value_enum)]
    pub variant: Option<GridVariant>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive editor (default)
    Tui,
    /// Print one day's grid with its titles
    Show(ShowArgs),
    /// Title a block range, replacing anything it overlaps
    Set(SetArgs),
    /// Remove every entry overlapping a block range
    Clear(ClearArgs),
    /// List dates that hold entries
    Dates,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    // The editor owns the terminal, so its logs go to a file.
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_file());
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(variant) = cli.variant {
        config.set_variant(variant);
    }
    let storage = storage::init(&paths, &config.storage, config.grid.variant)?;

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let store = ScheduleStore::load(Box::new(storage));
            let mut app = App::new(config, store);
            commands::run_tui(&mut app)
        }
        Commands::Show(args) => commands::show_day(config, storage, args),
        Commands::Set(args) => commands::set_range(config, storage, args),
        Commands::Clear(args) => commands::clear_range(config, storage, args),
        Commands::Dates => commands::list_dates(config, storage),
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
