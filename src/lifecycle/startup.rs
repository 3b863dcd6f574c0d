//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start the metrics exporter when enabled
//! - Bind the listener and serve until a shutdown signal

use std::net::SocketAddr;
use thiserror::Error;

use super::shutdown::Shutdown;
use super::signals::spawn_signal_handler;
use crate::config::ManagerConfig;
use crate::http::HttpServer;
use crate::net::{self, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Run the manager until SIGINT/SIGTERM.
pub async fn run(config: ManagerConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                address = %config.observability.metrics_address,
                error = %e,
                "Invalid metrics address, exporter disabled"
            ),
        }
    }

    let listener = net::bind(&config.listener).await?;
    let server = HttpServer::new(config);

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.wait()).await?;
    Ok(())
}
