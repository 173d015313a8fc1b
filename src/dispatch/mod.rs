//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Inbound request (body buffered)
//!     → pool.next_peer() ── none ──▶ 503
//!     → backend.record_request()
//!     → forward.rs ── ok ──▶ record latency, classify, return response
//!                  └─ err ─▶ resilience::retries
//!                              ├─ retry same backend after backoff
//!                              └─ mark down, next attempt (select again)
//!                                   └─ attempts exhausted ──▶ 503
//! ```

pub mod forward;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Response;

use crate::config::ErrorSignal;
use crate::http::response::service_unavailable;
use crate::load_balancer::BackendPool;
use crate::observability::metrics;
use crate::resilience::{DispatchState, FailureAction, RetryPolicy};

pub use forward::{ForwardError, Forwarder, HyperForwarder, ReplayableRequest};

/// Header compared against `200 OK` under `ErrorSignal::StatusHeader`.
pub const STATUS_HEADER: &str = "status";

/// Whether a completed upstream response counts toward the error counter.
pub fn is_error_response<B>(signal: ErrorSignal, response: &Response<B>) -> bool {
    match signal {
        ErrorSignal::StatusHeader => response
            .headers()
            .get(STATUS_HEADER)
            .map_or(true, |v| v.as_bytes() != b"200 OK"),
        ErrorSignal::StatusCode => !response.status().is_success(),
    }
}

/// Per-request control flow: select, forward, retry, fail over.
pub struct Dispatcher {
    pool: Arc<BackendPool>,
    forwarder: Arc<dyn Forwarder>,
    policy: RetryPolicy,
    error_signal: ErrorSignal,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<BackendPool>,
        forwarder: Arc<dyn Forwarder>,
        policy: RetryPolicy,
        error_signal: ErrorSignal,
    ) -> Self {
        Self {
            pool,
            forwarder,
            policy,
            error_signal,
        }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Route one inbound request to completion.
    ///
    /// The caller sees either a backend's response or a uniform 503.
    pub async fn route(&self, request: &ReplayableRequest) -> Response<Body> {
        let mut state = DispatchState::new();

        loop {
            if self.policy.attempts_exhausted(&state) {
                tracing::warn!(
                    path = %request.uri.path(),
                    attempts = state.attempts - 1,
                    "Max attempts reached, exiting"
                );
                return service_unavailable();
            }

            let Some(peer) = self.pool.next_peer() else {
                tracing::warn!(path = %request.uri.path(), "No alive backend available");
                return service_unavailable();
            };

            peer.record_request();
            let start = Instant::now();

            loop {
                match self.forwarder.forward(peer.url(), request).await {
                    Ok(response) => {
                        let latency = start.elapsed();
                        peer.record_latency(latency);
                        if is_error_response(self.error_signal, &response) {
                            peer.record_error();
                        }
                        metrics::record_request(peer.address(), response.status().as_u16(), latency);
                        return response;
                    }
                    Err(e) => {
                        tracing::warn!(
                            backend = %peer.address(),
                            retries = state.retries,
                            error = %e,
                            "Forward failed"
                        );

                        match self.policy.on_failure(&mut state) {
                            FailureAction::RetrySame(delay) => {
                                tokio::time::sleep(delay).await;
                            }
                            FailureAction::Failover => {
                                peer.record_latency(start.elapsed());
                                peer.record_error();
                                self.pool.mark_down(peer.address());
                                metrics::record_failover(peer.address());
                                tracing::warn!(
                                    backend = %peer.address(),
                                    path = %request.uri.path(),
                                    attempt = state.attempts,
                                    "Backend marked down, attempting retry"
                                );
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}
