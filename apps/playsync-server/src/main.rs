//! Playsync Server - standalone binary for the playback synchronization hub.

mod config;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use playsync_core::{start_server, AppState, Hub};
use tokio::signal;

use crate::config::resolve_port;

/// Playsync Server - real-time playback synchronization hub.
#[derive(Parser, Debug)]
#[command(name = "playsync-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "PLAYSYNC_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port. Falls back to the `PORT` environment variable, then 8080.
    #[arg(short = 'p', long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Playsync Server v{}", env!("CARGO_PKG_VERSION"));

    let port = resolve_port(args.port);
    let hub = Arc::new(Hub::new());
    let app_state = AppState::new(hub);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, app_state).await {
            log::error!("Server error: {e}");
        }
    });

    log::info!("HTTP server started on port {port}");

    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
