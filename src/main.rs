//! Request guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ trace ─▶ request id ─▶ headers ─▶ timeout
//!                      ─▶ rate limit ─▶ IP access ─▶ body limit
//!                      ─▶ decrypt ─▶ signature ─▶ encrypt
//!                      ─▶ route-group auth ─▶ handler
//!
//!     Cross-cutting: config (TOML + GUARD_* env, hot IP reload),
//!                    observability (tracing, Prometheus), lifecycle
//! ```
//!
//! Usage: `request-guard [config.toml]`

use std::path::PathBuf;

use tokio::net::TcpListener;

use request_guard::config::{self, ConfigWatcher};
use request_guard::lifecycle::{spawn_signal_listener, Shutdown};
use request_guard::observability::{logging, metrics};
use request_guard::GuardServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = match &config_path {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-guard starting");
    tracing::info!(
        config = ?config_path,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        signature = config.signature.enabled,
        encryption = config.encryption.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the server.
    let (_watcher, updates) = match &config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(rx))
        }
        None => (None, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    GuardServer::new(config)?
        .run(listener, updates, shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
