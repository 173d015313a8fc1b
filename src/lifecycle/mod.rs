//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Validate → Logging/metrics → Pool → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain → Background tasks exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, final stats flush

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::StartupError;
