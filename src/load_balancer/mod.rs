//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher asks for a peer
//!     → pool.rs (alive-first snapshot of registered backends)
//!     → Apply the configured selector:
//!         - round_robin.rs (rotate through alive backends)
//!         - weighted.rs (weight-length runs per backend)
//!     → backend.rs (Arc<Backend> handed back, or None)
//!
//! Health monitor / failover
//!     → pool.rs (set_alive / mark_down)
//!     → backend.rs liveness flag
//!     → alive-first snapshot refreshed
//! ```
//!
//! # Design Decisions
//! - The pool owns all liveness writes so the ordering never goes stale
//! - Selectors hold their own cursor state; the backend list is passed in
//! - Weighted round robin indexes registration order, so a liveness change
//!   never moves a run of turns onto another backend
//! - Dead backends are excluded from round robin; weighted round robin
//!   only excludes them when `wrr_skip_dead` is set

pub mod backend;
pub mod pool;
pub mod round_robin;
pub mod weighted;

use std::sync::Arc;

use crate::config::Method;

pub use backend::{Backend, StatsSnapshot};
pub use pool::{BackendPool, PoolError};
pub use round_robin::RoundRobin;
pub use weighted::WeightedRoundRobin;

/// A peer selection algorithm.
pub trait PeerSelector: Send + Sync + std::fmt::Debug {
    /// Pick the next backend, or `None` when no backend can take the request.
    fn next_peer(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;

    /// Whether `next_peer` gets the alive-first ordering (`true`) or the
    /// stable registration order (`false`).
    fn alive_first(&self) -> bool {
        true
    }
}

/// Build the selector for a configured method.
pub fn selector_for(method: Method, wrr_skip_dead: bool) -> Box<dyn PeerSelector> {
    match method {
        Method::Rr => Box::new(RoundRobin::new()),
        Method::Wrr if wrr_skip_dead => Box::new(WeightedRoundRobin::skipping_dead()),
        Method::Wrr => Box::new(WeightedRoundRobin::new()),
    }
}
