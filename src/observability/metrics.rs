//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): forwarded requests by backend, status
//! - `lb_request_duration_seconds` (histogram): upstream latency by backend
//! - `lb_backend_up` (gauge): 1=alive, 0=dead
//! - `lb_failovers_total` (counter): backends given up on mid-request
//! - `lb_unavailable_total` (counter): requests answered with 503
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - The Prometheus exporter only starts when `metrics_enabled` is set

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(backend: &str, status: u16, latency: Duration) {
    metrics::counter!(
        "lb_requests_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("lb_request_duration_seconds", "backend" => backend.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_backend_up(backend: &str, alive: bool) {
    metrics::gauge!("lb_backend_up", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

pub fn record_failover(backend: &str) {
    metrics::counter!("lb_failovers_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_unavailable() {
    metrics::counter!("lb_unavailable_total").increment(1);
}
