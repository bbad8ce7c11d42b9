//! mnms Daemon - Main entry point
//!
//! Serves device enrollment, onboarding and telemetry ingestion for
//! RouterOS devices.

mod api;
mod auth;
mod config;
mod metrics;
mod script;
mod server;
mod state;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "mnms")]
#[command(about = "RouterOS onboarding and telemetry ingestion daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mnms.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Decode a captured device payload, print it as JSON and exit
    #[arg(long, value_name = "FILE")]
    decode: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = args.decode {
        let payload = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read payload {}", path.display()))?;
        let envelope = mnms_core::decode_envelope(payload.trim_end_matches(['\r', '\n']))?;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    info!("mnms v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        bind = %config.daemon.bind,
        public_url = %config.daemon.public_url,
        "Configuration loaded"
    );

    // Create application state
    let state = state::AppState::new(&config)?;

    server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await
}
