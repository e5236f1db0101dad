mod app;
mod canvas;
mod cli;
mod codec;
mod config;
mod display;
mod error;
mod hotkey;
mod logging;
mod preset;
mod service;
mod store;
#[cfg(test)]
mod testing;
mod toggle;
mod ui;

use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info, warn};

use app::App;
use config::AppConfig;
use hotkey::TerminalHotkeys;
use preset::JsonPresetFile;
use service::DisplayPlacer;
use store::DisplayStateStore;

pub type Store = DisplayStateStore<DisplayPlacer, JsonPresetFile, TerminalHotkeys>;

#[derive(Parser, Debug)]
#[command(name = "dpui", version, about)]
struct Cli {
    /// Config file (default: <config dir>/dpui/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging; RUST_LOG is honoured
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List displays and their status
    List {
        #[arg(long)]
        json: bool,
    },
    /// List saved presets
    Presets,
    /// Apply a saved preset by name or id
    Preset { name: String },
    /// Enable a display
    Enable { id: String },
    /// Disable a display
    Disable {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Save the current arrangement as a preset
    Save {
        name: String,
        #[arg(long)]
        hotkey: Option<String>,
    },
    /// Delete a preset by name or id
    Delete { name: String },
    /// Apply a raw displayplacer command line
    Apply { config: String },
}

fn build_store(config: &AppConfig) -> Store {
    let presets = JsonPresetFile::new(config.presets_path());
    debug!(path = %presets.path().display(), "Preset file");
    DisplayStateStore::new(
        DisplayPlacer::new(config.tool.clone()),
        presets,
        TerminalHotkeys::default(),
        toggle::SystemClock,
    )
}

fn run_command(store: &mut Store, command: Command) -> error::Result<()> {
    store.load()?;
    match command {
        Command::List { json } => cli::list_displays(store, json),
        Command::Presets => cli::list_presets(store),
        Command::Preset { name } => cli::apply_preset(store, &name),
        Command::Enable { id } => cli::enable_display(store, &id),
        Command::Disable { id, yes } => cli::disable_display(store, &id, yes),
        Command::Save { name, hotkey } => cli::save_preset(store, &name, hotkey.as_deref()),
        Command::Delete { name } => cli::delete_preset(store, &name),
        Command::Apply { config } => cli::apply_config(store, &config),
    }
}

fn main() -> io::Result<()> {
    let args = Cli::parse();
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let loaded = AppConfig::load(&config_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();
    let debug = args.verbose || config.debug;

    let sink = if args.command.is_some() { logging::Sink::Stderr } else { logging::Sink::File };
    let _guard = logging::init(debug, sink);
    if let Err(e) = &loaded {
        warn!(error = %e, "Using default config");
    }

    if let Some(command) = args.command {
        let mut store = build_store(&config);
        let result = run_command(&mut store, command);
        store.teardown();
        if let Err(e) = result {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return Ok(());
    }

    info!(config = %config_path.display(), tool = %config.tool, "Starting TUI");
    let store = build_store(&config);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, config.canvas);

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;

    result
}
