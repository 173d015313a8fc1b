//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve and validate configuration
//! - Initialize logging and metrics
//! - Build the backend pool and bind the listener
//! - Run the server until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{loader, BalancerConfig, Cli, ConfigError, ObservabilityConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::load_balancer::PoolError;
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

/// Start the load balancer from command-line arguments and run to completion.
pub async fn start(cli: Cli) -> Result<(), StartupError> {
    let config = match loader::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Report config errors with the default filter.
            logging::init_logging(&ObservabilityConfig::default());
            return Err(e.into());
        }
    };
    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "layer7-lb starting");
    run(config).await
}

/// Run with an already resolved configuration.
pub async fn run(config: BalancerConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let address = config.listener.bind_address();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
