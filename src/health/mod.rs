//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect within timeout)
//!     → BackendPool::set_alive
//!
//! Passive failure handling lives in the dispatcher:
//!     Retries against one backend exhausted
//!     → BackendPool::mark_down
//! ```
//!
//! # Design Decisions
//! - One probe result sets liveness directly (no thresholds)
//! - The first cycle runs one period after startup; backends start alive
//! - The probe is a trait so tests can script reachability

pub mod active;
pub mod probe;

pub use active::HealthMonitor;
pub use probe::{Prober, TcpProber};
