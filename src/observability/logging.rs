//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Configure log level from config, overridable via `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Stats lines go to their own file (stats module), not through tracing

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!("layer7_lb={level},tower_http={level}", level = config.log_level)
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
