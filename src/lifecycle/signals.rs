//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) or, on unix, SIGTERM
//! - Translate either into the broadcast shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)

use crate::lifecycle::Shutdown;

/// Resolve once the process is asked to stop.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
    }
}

/// Spawn a task that triggers `shutdown` on the first signal.
pub fn spawn_signal_handler(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    })
}
