//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track liveness behind a reader/writer lock
//! - Track request, error and latency counters (for the stats sink)

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use url::Url;

/// A single upstream server.
///
/// Only the liveness flag and the counters change after registration.
#[derive(Debug)]
pub struct Backend {
    /// Parsed base URL requests are forwarded to.
    url: Url,
    /// Weight for weighted round robin, always >= 1.
    weight: u64,
    /// Liveness flag. Many readers (every routing decision), rare writers.
    alive: RwLock<bool>,
    /// Independently updated counters.
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    latency_nanos: AtomicU64,
}

/// Point-in-time copy of a backend's counters.
///
/// The three values are read separately and need not be mutually consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub url: String,
    pub alive: bool,
    pub weight: u64,
    pub requests: u64,
    pub errors: u64,
    pub latency_ns: u64,
}

impl Backend {
    /// Create a backend that starts out alive.
    ///
    /// A weight of zero is stored as one so weighted selection always has a
    /// turn to hand out.
    pub fn new(url: Url, weight: u32) -> Self {
        Self {
            url,
            weight: u64::from(weight.max(1)),
            alive: RwLock::new(true),
            counters: Counters::default(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Identity used for lookups and logs (the normalized URL string).
    pub fn address(&self) -> &str {
        self.url.as_str()
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    // --- Liveness ---

    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    /// Overwrite the liveness flag, returning the previous value.
    ///
    /// Callers holding a pool should go through `BackendPool::set_alive` so the
    /// alive-first ordering is refreshed.
    pub fn set_alive(&self, alive: bool) -> bool {
        let mut guard = self.alive.write();
        std::mem::replace(&mut *guard, alive)
    }

    // --- Counters ---

    pub fn record_request(&self) {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to the cumulative latency, saturating at `u64::MAX` nanoseconds per sample.
    pub fn record_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.counters.latency_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn latency_nanos(&self) -> u64 {
        self.counters.latency_nanos.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            url: self.address().to_string(),
            alive: self.is_alive(),
            weight: self.weight,
            requests: self.request_count(),
            errors: self.error_count(),
            latency_ns: self.latency_nanos(),
        }
    }
}
