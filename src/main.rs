//! # NOAA Sync CLI (`noaa-sync`)
//!
//! Runs one connector invocation the way the sync runtime would and prints
//! the response as JSON on stdout. Logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! noaa-sync [--config ./config/noaa-sync.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `noaa-sync connectors` | List the built-in connectors |
//! | `noaa-sync invoke <connector>` | Run one invocation with an empty state |
//! | `noaa-sync invoke <connector> --event state.json` | Run one invocation with a persisted state |
//!
//! The API token is read from the variable named by `[api].token_env`
//! (`NOAA_API_KEY` by default). Without it, `invoke` prints the error
//! response and exits successfully, as the runtime expects.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use noaa_sync::config::{self, Config, Credential};
use noaa_sync::invoke;
use noaa_sync::models::InvocationInput;
use noaa_sync::traits::ConnectorKind;
use noaa_sync::window::SystemClock;

/// NOAA Sync: incremental NOAA Climate Data Online connectors.
#[derive(Parser)]
#[command(name = "noaa-sync", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in connectors.
    Connectors,

    /// Run one invocation of a connector and print the response.
    Invoke {
        /// Connector name (`daily`, `stations`, `max_temp`).
        connector: String,

        /// Event JSON (`{"state": {...}}`). Use `-` for stdin.
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("noaa_sync=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn read_event(path: Option<&Path>) -> anyhow::Result<InvocationInput> {
    let raw = match path {
        None => return Ok(InvocationInput::default()),
        Some(p) if p == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read event file: {}", p.display()))?,
    };
    if raw.trim().is_empty() {
        return Ok(InvocationInput::default());
    }
    serde_json::from_str(&raw).context("Failed to parse event JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Connectors => {
            println!("{:<12} DESCRIPTION", "CONNECTOR");
            for kind in ConnectorKind::ALL {
                println!("{:<12} {}", kind.name(), kind.description());
            }
        }
        Commands::Invoke { connector, event } => {
            let kind = invoke::resolve(&connector)?;
            let event = read_event(event.as_deref())?;
            let credential = Credential::from_env(&cfg.api.token_env).ok();
            let response =
                invoke::invoke(&cfg, kind, &event, credential, Arc::new(SystemClock)).await;
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}
