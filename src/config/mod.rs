//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → command-line flags (cli.rs)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → handed to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Any validation error is fatal before the listener binds

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::ConfigError;
pub use schema::{
    AdminConfig, BackendConfig, BalancerConfig, ErrorSignal, HealthCheckConfig, ListenerConfig,
    LimitsConfig, Method, ObservabilityConfig, RetryConfig, SelectionConfig, StatsConfig,
    TimeoutConfig,
};
