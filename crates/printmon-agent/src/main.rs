use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use printmon_agent::presets::{preset, PRESET_NAMES};
use printmon_agent::{api, CommandHandler, HostConfig, SettingsStore};
use printmon_core::SharedEventBus;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "printmon", version, about = "AI print failure monitor")]
struct Cli {
    /// Settings file (TOML). Created on first save.
    #[arg(long, env = "PRINTMON_SETTINGS", default_value = "printmon.toml", global = true)]
    settings: PathBuf,

    #[arg(
        long,
        env = "OCTOPRINT_URL",
        default_value = "http://localhost:5000",
        global = true
    )]
    octoprint_url: String,

    #[arg(long, env = "OCTOPRINT_API_KEY", global = true)]
    octoprint_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor and serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:5050")]
        bind: SocketAddr,
    },
    /// Run one voting cycle now and print the outcome.
    Check,
    /// Check that a chat completions endpoint answers.
    TestConnection {
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Print a provider preset as JSON.
    Preset { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let host = HostConfig {
        octoprint_url: cli.octoprint_url,
        api_key: cli.octoprint_api_key,
    };

    match cli.command {
        Command::Preset { name } => {
            let Some(p) = preset(&name) else {
                anyhow::bail!("unknown preset '{name}' (known: {})", PRESET_NAMES.join(", "));
            };
            println!("{}", serde_json::to_string_pretty(&p)?);
        }
        Command::TestConnection {
            endpoint,
            api_key,
            model,
        } => {
            let handler = load(&cli.settings, host)?;
            let endpoint = endpoint.unwrap_or(handler.settings().await.api_endpoint);
            let reply = handler
                .handle(
                    "test_connection",
                    &json!({ "endpoint": endpoint, "api_key": api_key, "model": model }),
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Check => {
            let handler = load(&cli.settings, host)?;
            let outcome = handler
                .check_now()
                .await
                .context("Voting cycle failed")?;
            println!("action: {}", outcome.action());
            println!("votes:  {}", outcome.votes());
        }
        Command::Serve { bind } => {
            let handler = Arc::new(load(&cli.settings, host)?);
            spawn_event_logger(handler.monitor().events().clone());
            handler.apply_saved_settings().await;

            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            info!(addr = %bind, "Print monitor API listening");
            axum::serve(listener, api::router(handler.clone()))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;

            handler.monitor().stop().await;
            info!("Print monitor shut down");
        }
    }

    Ok(())
}

fn load(settings: &Path, host: HostConfig) -> Result<CommandHandler> {
    let store = SettingsStore::load(settings)
        .with_context(|| format!("Failed to load settings from {}", settings.display()))?;
    CommandHandler::assemble(store, host)
}

/// Log every monitor event; the bus has no other consumer in this binary.
fn spawn_event_logger(events: SharedEventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(
                    event = event.event_name(),
                    payload = %event.payload(),
                    "Monitor event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
