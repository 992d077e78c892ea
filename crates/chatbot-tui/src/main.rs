use std::path::PathBuf;

use anyhow::{Context, Result};
use chatbot_core::{ChatSession, Config};
use clap::Parser;

mod app;
mod clipboard;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "chatbot")]
#[command(about = "Chat window that streams replies from an OpenAI-compatible endpoint")]
struct Cli {
    /// Chat completion endpoint (overrides config and CHATBOT_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,
    /// Model to start with
    #[arg(short, long)]
    model: Option<String>,
    /// Path to a config file instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init().context("failed to set up logging")?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::get_config_path().context("no config directory")?,
    };
    let mut config = Config::load_from(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    // Overrides apply to this run only and are never written back
    config.apply_env_overrides();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(model) = cli.model {
        config.initial_model = model;
    }
    tracing::info!(endpoint = %config.endpoint, log = ?log_path, "starting chatbot");

    let session = ChatSession::http();
    let mut app = App::new(config, config_path, session);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                handler::handle_event(app, event)?;
            }
            changed = app.updates.changed() => {
                if changed.is_err() {
                    break;
                }
                app.sync_snapshot();
            }
        }

        app.poll_turn().await;
    }

    app.quit();
    Ok(())
}
