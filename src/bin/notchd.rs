//! Notch daemon - session tracking for Claude Code
//!
//! Receives lifecycle hook events over local HTTP and derives live
//! per-session display state.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon on the configured port (default 27182)
//! notchd
//!
//! # Override the port
//! notchd --port 9000
//!
//! # Use an on-disk design config instead of the built-in one
//! notchd --config ./notch-config.json
//!
//! # Enable debug logging
//! RUST_LOG=notchd=debug notchd
//! ```
//!
//! SIGTERM/SIGINT trigger a graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use notch_core::NotchConfig;
use notchd::registry::spawn_registry;
use notchd::server;
use notchd::settings::UserSettings;
use notchd::stats::UsageStats;

/// Notch daemon - Claude Code session monitor
#[derive(Parser, Debug)]
#[command(name = "notchd", version, about)]
struct Args {
    /// Port to listen on (overrides user settings)
    #[arg(short, long)]
    port: Option<u16>,

    /// Design config file (defaults to the built-in config)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("notchd=info".parse()?)
                .add_directive("notch_core=info".parse()?)
                .add_directive("notch_protocol=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Config load failure is fatal: the state machine cannot classify
    // tools without its lookup tables.
    let config = match &args.config {
        Some(path) => NotchConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NotchConfig::builtin().context("parsing built-in config")?,
    };
    let settings = UserSettings::load();
    let port = args.port.unwrap_or_else(|| settings.server_port());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port,
        pid = std::process::id(),
        "notchd starting"
    );

    // Graceful shutdown on SIGTERM/SIGINT
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        info!("shutdown signal received");
        shutdown.cancel();
    });

    let registry = spawn_registry(
        Arc::new(config),
        Arc::new(settings),
        UsageStats::open_default(),
    );
    info!("session registry started");

    // Port already in use surfaces here as a fatal startup error
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    server::serve(addr, registry, cancel)
        .await
        .context("hook server failed")?;

    info!("notchd stopped");
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
                info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}
