use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use taski_client::{BlockingApiClient, FileTokenStore, TokenStore, DEFAULT_BASE_URL};
use taski_tui::app::App;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taski", version, about = "Terminal client for Taski")]
struct Cli {
    /// API base URL, including the `/api` prefix
    #[arg(long, env = "TASKI_SERVER_URL", default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Where the session is stored
    #[arg(long, env = "TASKI_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log file (defaults to taski.log in the data directory)
    #[arg(long, env = "TASKI_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Forget the stored session and exit
    Logout,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = Arc::new(match cli.data_dir {
        Some(dir) => FileTokenStore::new(dir),
        None => FileTokenStore::open_default(),
    });

    // The terminal belongs to the UI, so logs go to a file.
    let log_file = cli
        .log_file
        .unwrap_or_else(|| store.dir().join("taski.log"));
    init_logging(&log_file)?;

    if let Some(Command::Logout) = cli.command {
        store.clear().context("failed to clear stored session")?;
        info!("stored session cleared");
        println!("Logged out.");
        return Ok(());
    }

    info!(server = %cli.server, "starting taski");
    let client = BlockingApiClient::new(&cli.server, store)
        .with_context(|| format!("invalid server URL {}", cli.server))?;

    run_tui(client)
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_tui(client: BlockingApiClient) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, client);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        eprintln!("Error: {e}");
    }

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    client: BlockingApiClient,
) -> Result<()> {
    let mut app = App::new(client)?;

    loop {
        terminal.draw(|frame| app.render(frame))?;

        // The loading frame is on screen; fetch before waiting for input.
        if app.has_pending_load() {
            app.load_pending();
            continue;
        }

        if let Event::Key(key) = event::read()? {
            // Ctrl+C always quits
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }
            // q quits unless we're in an input mode
            if key.code == KeyCode::Char('q') && !app.is_input_mode() {
                break;
            }
            app.handle_key(key);
        }
    }

    Ok(())
}
