//! Background Replacement server CLI
//!
//! Parses arguments (each with an environment-variable fallback), sets up
//! tracing and runs the HTTP/WebSocket server until Ctrl+C or SIGTERM.

use super::config::CliConfigBuilder;
use crate::server;
use crate::tracing_config::init_cli_tracing;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Background replacement API server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-bgreplace")]
pub struct Cli {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listening port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Deployment label reported by /api/status (falls back to NODE_ENV, then "development")
    #[arg(long, env = "APP_ENV")]
    pub environment: Option<String>,

    /// remove.bg API key (background removal is simulated without it)
    #[arg(long, env = "REMOVE_BG_API_KEY", hide_env_values = true)]
    pub remove_bg_api_key: Option<String>,

    /// OpenAI API key (primary background generation provider)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Stability AI API key (secondary background generation provider)
    #[arg(long, env = "STABILITY_AI_API_KEY", hide_env_values = true)]
    pub stability_api_key: Option<String>,

    /// Maximum upload size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,

    /// Deadline for each provider call, in seconds
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 60)]
    pub provider_timeout_secs: u64,

    /// Maximum number of uploads processed at once
    #[arg(long, env = "MAX_CONCURRENT_JOBS", default_value_t = 8)]
    pub max_concurrent_jobs: usize,

    /// How long an upload may wait for a free worker, in seconds
    #[arg(long, env = "QUEUE_TIMEOUT_SECS", default_value_t = 30)]
    pub queue_timeout_secs: u64,

    /// Simulated background removal delay, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub simulated_removal_ms: u64,

    /// Simulated background generation delay, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub simulated_generation_ms: u64,

    /// Directory served for unmatched routes (ignored when missing)
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// Disable static file serving
    #[arg(long)]
    pub no_static: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit JSON logs (requires the tracing-json feature)
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Also write logs to this file, rotated daily (requires the tracing-files feature)
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub validate: bool,
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Main entry point for the server CLI
///
/// # Errors
/// - Tracing initialization failures
/// - Invalid configuration
/// - Server bind or runtime failures
pub async fn main() -> Result<()> {
    // `.env` must be loaded before clap reads environment fallbacks
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.json_logs, cli.log_file.as_deref())
        .context("Failed to initialize tracing")?;

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!(error = %e, "Failed to load .env file"),
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;

    if cli.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    info!(
        environment = %config.environment,
        port = config.port,
        max_upload_bytes = config.max_upload_bytes,
        max_concurrent_jobs = config.max_concurrent_jobs,
        "Starting background replacement API"
    );

    server::serve(config, shutdown_signal())
        .await
        .context("Server terminated with an error")
}
