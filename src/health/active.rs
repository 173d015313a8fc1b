//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend's reachability
//! - Write the result into the pool's liveness state
//! - Log each backend's status and every transition

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{Prober, TcpProber};
use crate::load_balancer::BackendPool;
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    interval: Duration,
    timeout: Duration,
    prober: Arc<dyn Prober>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: &HealthCheckConfig) -> Self {
        Self::with_prober(pool, config, Arc::new(TcpProber))
    }

    pub fn with_prober(
        pool: Arc<BackendPool>,
        config: &HealthCheckConfig,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            pool,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            prober,
        }
    }

    /// Override the cycle period and probe timeout.
    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    /// Run until the shutdown signal. The first cycle starts one period in.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::info!("Starting health check");
                    self.check_all().await;
                    tracing::info!("Completed");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once and apply the results.
    pub async fn check_all(&self) {
        for backend in self.pool.backends() {
            let alive = self.prober.probe(backend.url(), self.timeout).await;
            let was_alive = self.pool.set_alive(backend, alive);

            let status = if alive { "up" } else { "down" };
            tracing::info!(url = %backend.address(), status, "Health check result");
            if was_alive != alive {
                tracing::warn!(
                    url = %backend.address(),
                    from = if was_alive { "up" } else { "down" },
                    to = status,
                    "Backend liveness transition"
                );
            }

            metrics::record_backend_up(backend.address(), alive);
        }
    }
}
