//! gavel - Compliance Review Event Console
//!
//! Terminal UI for replaying, filtering, and auditing reviewed model
//! interactions from the compliance pipeline.

mod app;
mod ui;

use std::io;
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use gavel_core::{ApiClient, Config, LiveChannel};

use crate::app::{App, AppMessage, Command};

#[derive(Parser, Debug)]
#[command(name = "gavel", about = "Compliance review event console")]
struct Args {
    /// Override the backend endpoint from the config file
    #[arg(long)]
    endpoint: Option<String>,

    /// Path to an alternate config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };
    if let Some(endpoint) = args.endpoint {
        config.console.endpoint = endpoint;
    }

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        gavel_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("gavel TUI starting up");

    let client = Arc::new(ApiClient::new(&config.console).context("failed to create API client")?);
    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    let (tx, rx) = mpsc::channel::<AppMessage>();

    let mut channel = LiveChannel::new();
    let mut app = App::new(&config);

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(
        &mut terminal,
        &mut app,
        &runtime,
        &client,
        &mut channel,
        &tx,
        &rx,
    );

    // Restore terminal
    channel.close();
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("gavel TUI shutting down");

    result
}

/// Run the main application loop.
#[allow(clippy::too_many_arguments)]
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    runtime: &tokio::runtime::Runtime,
    client: &Arc<ApiClient>,
    channel: &mut LiveChannel,
    tx: &mpsc::Sender<AppMessage>,
    rx: &mpsc::Receiver<AppMessage>,
) -> Result<()> {
    for command in app.startup() {
        execute_command(command, app, runtime, client, channel, tx);
    }

    loop {
        // Drain async results delivered since the last tick.
        while let Ok(message) = rx.try_recv() {
            for command in app.apply(message) {
                execute_command(command, app, runtime, client, channel, tx);
            }
        }

        // Drain channel frames, fire stage transitions, auto-advance.
        app.tick();

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    for command in app.handle_key(key) {
                        execute_command(command, app, runtime, client, channel, tx);
                    }
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Execute one command issued by a reducer transition.
fn execute_command(
    command: Command,
    app: &mut App,
    runtime: &tokio::runtime::Runtime,
    client: &Arc<ApiClient>,
    channel: &mut LiveChannel,
    tx: &mpsc::Sender<AppMessage>,
) {
    match command {
        Command::LoadRuns => {
            let client = Arc::clone(client);
            let tx = tx.clone();
            runtime.spawn(async move {
                let _ = tx.send(AppMessage::RunsLoaded(client.list_runs().await));
            });
        }
        Command::LoadTimeline { run_id, generation } => {
            let client = Arc::clone(client);
            let tx = tx.clone();
            runtime.spawn(async move {
                let result = client.fetch_timeline(&run_id).await;
                let _ = tx.send(AppMessage::TimelineLoaded { generation, result });
            });
        }
        Command::LoadOptions => {
            let client = Arc::clone(client);
            let tx = tx.clone();
            runtime.spawn(async move {
                let _ = tx.send(AppMessage::OptionsLoaded(client.console_options().await));
            });
        }
        Command::OpenChannel { run_id } => {
            // Channel tasks must be spawned inside the runtime context.
            let _guard = runtime.enter();
            let subscription = channel.open(client.stream_url(&run_id, true));
            app.set_subscription(subscription);
        }
        Command::CloseChannel => {
            channel.close();
        }
        Command::Submit(submission) => {
            let client = Arc::clone(client);
            let tx = tx.clone();
            runtime.spawn(async move {
                let _ = tx.send(AppMessage::Submitted(client.submit(&submission).await));
            });
        }
        Command::LogReveal(ticket) => {
            let client = Arc::clone(client);
            let tx = tx.clone();
            runtime.spawn(async move {
                let result = client.log_reveal(&ticket.request).await;
                let _ = tx.send(AppMessage::RevealFinished {
                    exchange_id: ticket.exchange_id,
                    field: ticket.field,
                    result,
                });
            });
        }
    }
}
