//! colog: a concurrent TCP log-collection server.
//!
//! Clients connect over plain TCP, send their name as the first line, then
//! stream newline-delimited log records. Each record is appended to that
//! client's own file, prefixed with a per-session sequence number and a
//! millisecond timestamp.
//!
//! Features:
//! - One append-only log file per client name
//! - Start/stop markers around every session
//! - Configuration via CLI arguments or TOML file

mod config;
mod entry;
mod server;
mod session;
mod store;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        prefix = %config.prefix,
        log_dir = %config.log_dir.display(),
        "Starting colog server"
    );

    let server = Server::bind(config).await?;
    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        // The accept loop only returns on a listener-level failure.
        result = &mut server_task => {
            result??;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            // Abandons in-flight sessions at their next read; best-effort
            // shutdown, no drain sequencing.
            server_task.abort();
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).ok();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            match terminate.as_mut() {
                Some(term) => { term.recv().await; }
                None => std::future::pending::<()>().await,
            }
        } => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
