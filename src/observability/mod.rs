//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! Per-backend request/error/latency totals are kept on the backend itself
//! and written out by the stats module.

pub mod logging;
pub mod metrics;
