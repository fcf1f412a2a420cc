//! Demo SSE server.
//!
//! Serves `GET /events`, a stream of numbered tick events, and `GET /health`.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! sseserver config/sseserver.toml
//!
//! # With environment variables
//! SSESERVER_LISTEN_ADDR=0.0.0.0:8080 SSESERVER_EVENT_INTERVAL_MS=250 sseserver
//!
//! # Log every outgoing event
//! sseserver --log-events --debug
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sseserver::{
    config::{Config, LoggingConfig},
    eventlog,
    metrics::{init_metrics, start_metrics_server},
    server::{self, AppState},
    shutdown::ShutdownCoordinator,
};

/// Server-Sent Events demo server.
#[derive(Parser, Debug)]
#[command(name = "sseserver")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Override listen address.
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,

    /// Log every outgoing event.
    #[arg(long)]
    log_events: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_ref())?;

    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    if args.log_events {
        config.logging.log_events = true;
    }

    init_logging(&config.logging)?;

    init_metrics();
    if config.metrics.enabled {
        start_metrics_server(config.metrics.listen_addr.parse()?)?;
    }

    let shutdown = ShutdownCoordinator::new();

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .map_err(|e| {
            sseserver::ServerError::Bind(format!(
                "Failed to bind {}: {}",
                config.server.listen_addr, e
            ))
        })?;

    tracing::info!(
        addr = %listener.local_addr()?,
        interval_ms = config.stream.interval_ms,
        log_events = config.logging.log_events,
        "SSE server listening"
    );

    tokio::spawn(handle_signals(shutdown.clone()));

    let state = Arc::new(AppState {
        stream: config.stream.clone(),
        channel_capacity: config.server.channel_capacity,
        event_log: config
            .logging
            .log_events
            .then(|| Arc::new(eventlog::trace_lines) as eventlog::Printer),
        shutdown: shutdown.clone(),
    });

    server::serve(listener, state).await?;

    tracing::info!(
        active = shutdown.active_streams(),
        timeout_secs = config.server.shutdown_timeout_secs,
        "Waiting for streams to drain"
    );

    match tokio::time::timeout(config.server.shutdown_timeout(), shutdown.wait_for_drain()).await
    {
        Ok(()) => tracing::info!("All streams drained"),
        Err(_) => tracing::warn!(
            active = shutdown.active_streams(),
            "Shutdown timeout reached, forcing exit"
        ),
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let mut filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    if config.log_events {
        filter = filter.add_directive("sseserver::events=debug".parse()?);
    }

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }

    Ok(())
}

/// Handle Unix signals.
async fn handle_signals(shutdown: ShutdownCoordinator) {
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
    let mut sighup = signal(SignalKind::hangup()).expect("Failed to register SIGHUP");

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating shutdown");
                shutdown.shutdown();
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown");
                shutdown.shutdown();
                break;
            }
            _ = sighup.recv() => {
                tracing::info!(
                    active_streams = shutdown.active_streams(),
                    "Received SIGHUP, status report"
                );
            }
        }
    }
}
