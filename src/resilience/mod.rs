//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forward to backend fails:
//!     → retries.rs (retry same backend after fixed backoff)
//!     → budget for this backend spent: mark it down, select another peer
//!     → attempt budget spent: 503 to the client
//! ```
//!
//! # Design Decisions
//! - Bounded: attempts × retries caps the work per inbound request
//! - Failover feeds liveness back into the pool immediately, ahead of the
//!   next health check
//! - Retry detail never reaches the client; it sees a response or a 503

pub mod retries;

pub use retries::{DispatchState, FailureAction, RetryPolicy};
