//! Relay Daemon - line-oriented TCP chat server
//!
//! Clients connect over TCP, pick a display name, and every line they send
//! is relayed to all other connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8000)
//! relayd
//!
//! # Listen on a specific port, all interfaces
//! relayd --bind :9000
//!
//! # Load settings from a file, override the level from the environment
//! CHATSERVER_LOG_LEVEL=debug relayd --config relay.toml
//!
//! # Human-readable logs, debug output for sessions only
//! RUST_LOG=relayd::session=debug relayd --log-format logfmt
//! ```
//!
//! Settings are layered: defaults, then the `--config` file, then
//! `CHATSERVER_*` environment variables, then command-line flags.
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use relayd::config::Config;
use relayd::logging;
use relayd::registry::spawn_registry;
use relayd::server::ChatServer;

/// Relay daemon - line-oriented TCP chat server
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on (HOST:PORT, or :PORT for all interfaces)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Log level: error, warn, info or debug
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log format: json or logfmt
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,
}

impl Args {
    /// Builds the effective configuration, flags taking precedence.
    fn into_config(self) -> Result<Config> {
        let mut config =
            Config::load(self.config.as_deref()).context("Failed to load configuration")?;

        let overrides = [
            ("bind_address", self.bind),
            ("log_level", self.log_level),
            ("log_format", self.log_format),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                config
                    .set(field, &value)
                    .with_context(|| format!("Invalid --{}", field.replace('_', "-")))?;
            }
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    run_daemon(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: Config) -> Result<()> {
    logging::init(config.log_level, config.log_format)?;

    serve(config).instrument(logging::service_span()).await
}

/// Runs the server until a shutdown signal arrives.
async fn serve(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Relay daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    }
    .in_current_span());

    let registry = spawn_registry(config.max_sessions);

    let server = ChatServer::bind(&config, registry, cancel_token)
        .await
        .with_context(|| format!("Failed to start server on {}", config.bind_address))?;

    info!(
        address = %server.local_addr(),
        queue_capacity = config.queue_capacity,
        overflow_policy = %config.overflow_policy,
        max_sessions = config.max_sessions,
        "Starting server"
    );

    server.run().await;

    info!("Relay daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
