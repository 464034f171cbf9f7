use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use kbchat_core::{ChatApiClient, ChatWidget, Config};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod app;
mod handler;
mod tui;
mod ui;

use app::{App, TuiView};
use tui::{EventHandler, Tui, TICK_RATE};

#[derive(Parser)]
#[command(name = "kbchat", version)]
#[command(about = "Terminal chat client for a knowledge-base assistant")]
struct Cli {
    /// Backend root URL (serves /api/chat and /api/health)
    #[arg(long, env = "KBCHAT_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "KBCHAT_TIMEOUT")]
    timeout: Option<u64>,

    /// Write the effective base URL and timeout to the config file
    #[arg(long)]
    save_config: bool,
}

/// Set up file logging; the terminal belongs to the UI.
fn setup_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = Config::config_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("kbchat.log");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| anyhow!("Failed to open {}: {}", log_path.display(), e))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring config file: {:#}", e);
        Config::new()
    });

    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = Some(timeout);
    }

    if cli.save_config {
        config.save()?;
        tracing::info!("Saved config to {}", Config::get_config_path()?.display());
    }

    Ok(config)
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    app.start();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    app.abort_pending();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = setup_logging()?;
    let config = resolve_config(&cli)?;

    tracing::info!(base_url = config.base_url(), "starting kbchat");

    let client = ChatApiClient::new(config.base_url(), config.timeout())?;
    let widget = ChatWidget::new(Arc::new(client), TuiView::new(), config.preset_questions())
        .with_time_format(config.time_format());
    let mut app = App::new(widget);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}
