//! Backend pool management.
//!
//! # Responsibilities
//! - Own the registered backends for the life of the process
//! - Own every liveness write, keeping an alive-first ordering current
//! - Apply the configured selector to pick a peer

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use url::Url;

use crate::config::BalancerConfig;
use crate::load_balancer::{backend::Backend, selector_for, PeerSelector, StatsSnapshot};

/// Error type for pool construction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("backend pool is empty")]
    Empty,

    #[error("invalid backend url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// The authoritative set of backends plus the peer selector.
///
/// Backends are registered before the pool is shared and are never removed.
/// Selection reads an alive-first snapshot through `ArcSwap`, so routing
/// never waits on a liveness writer.
#[derive(Debug)]
pub struct BackendPool {
    /// Registration order.
    backends: Vec<Arc<Backend>>,
    /// Alive backends first, each partition in registration order.
    ordered: ArcSwap<Vec<Arc<Backend>>>,
    /// Serializes snapshot rebuilds so a stale rebuild cannot land last.
    reorder: Mutex<()>,
    selector: Box<dyn PeerSelector>,
}

impl BackendPool {
    /// Create an empty pool using `selector`.
    pub fn new(selector: Box<dyn PeerSelector>) -> Self {
        Self {
            backends: Vec::new(),
            ordered: ArcSwap::from_pointee(Vec::new()),
            reorder: Mutex::new(()),
            selector,
        }
    }

    /// Build the pool described by a validated configuration.
    pub fn from_config(config: &BalancerConfig) -> Result<Self, PoolError> {
        let selector = selector_for(config.balancer.method, config.balancer.wrr_skip_dead);
        let mut pool = Self::new(selector);

        for backend in &config.backends {
            let url = Url::parse(backend.url.trim()).map_err(|source| PoolError::InvalidUrl {
                url: backend.url.clone(),
                source,
            })?;
            if backend.weight == 0 {
                tracing::warn!(url = %url, "Backend weight 0 treated as 1");
            }
            pool.register(Backend::new(url, backend.weight));
        }

        if pool.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(pool)
    }

    /// Add a backend. Only possible before the pool is shared.
    pub fn register(&mut self, backend: Backend) -> Arc<Backend> {
        let backend = Arc::new(backend);
        tracing::info!(url = %backend.address(), weight = backend.weight(), "Configured server");
        self.backends.push(backend.clone());
        self.refresh_ordering();
        backend
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// All backends in registration order (for health checking and stats).
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Current alive-first ordering.
    pub fn ordered(&self) -> Arc<Vec<Arc<Backend>>> {
        self.ordered.load_full()
    }

    /// Ask the selector for the next peer.
    pub fn next_peer(&self) -> Option<Arc<Backend>> {
        if !self.selector.alive_first() {
            return self.selector.next_peer(&self.backends);
        }
        let ordered = self.ordered.load();
        if ordered.is_empty() {
            return None;
        }
        self.selector.next_peer(&ordered)
    }

    pub fn is_alive(&self, backend: &Backend) -> bool {
        backend.is_alive()
    }

    /// Set a backend's liveness and refresh the ordering if it changed.
    ///
    /// Returns the previous liveness.
    pub fn set_alive(&self, backend: &Backend, alive: bool) -> bool {
        let was_alive = backend.set_alive(alive);
        if was_alive != alive {
            tracing::debug!(url = %backend.address(), alive, "Backend liveness changed");
            self.refresh_ordering();
        }
        was_alive
    }

    /// Mark the backend with this exact address as dead. No-op if unknown.
    ///
    /// Returns whether a backend matched.
    pub fn mark_down(&self, address: &str) -> bool {
        match self.find(address) {
            Some(backend) => {
                self.set_alive(backend, false);
                true
            }
            None => false,
        }
    }

    /// Linear lookup by exact address.
    pub fn find(&self, address: &str) -> Option<&Arc<Backend>> {
        self.backends.iter().find(|b| b.address() == address)
    }

    /// Read every backend's counters without blocking routing.
    pub fn snapshot(&self) -> Vec<StatsSnapshot> {
        self.backends.iter().map(|b| b.snapshot()).collect()
    }

    fn refresh_ordering(&self) {
        let _guard = self.reorder.lock();
        let (mut alive, dead): (Vec<_>, Vec<_>) =
            self.backends.iter().cloned().partition(|b| b.is_alive());
        alive.extend(dead);
        self.ordered.store(Arc::new(alive));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, Method};
    use crate::load_balancer::{RoundRobin, WeightedRoundRobin};

    fn pool_of(n: usize) -> BackendPool {
        let mut pool = BackendPool::new(Box::new(RoundRobin::new()));
        for i in 0..n {
            let url = Url::parse(&format!("http://127.0.0.1:{}", 9000 + i)).unwrap();
            pool.register(Backend::new(url, 1));
        }
        pool
    }

    fn ordered_addresses(pool: &BackendPool) -> Vec<String> {
        pool.ordered().iter().map(|b| b.address().to_string()).collect()
    }

    #[test]
    fn empty_pool_has_no_peer() {
        let pool = BackendPool::new(Box::new(RoundRobin::new()));
        assert!(pool.next_peer().is_none());
    }

    #[test]
    fn from_config_rejects_empty() {
        let config = BalancerConfig::default();
        assert!(matches!(BackendPool::from_config(&config), Err(PoolError::Empty)));
    }

    #[test]
    fn from_config_registers_in_order() {
        let mut config = BalancerConfig::default();
        config.balancer.method = Method::Wrr;
        config.backends.push(BackendConfig::weighted("http://127.0.0.1:9001", 3));
        config.backends.push(BackendConfig::weighted("http://127.0.0.1:9002", 0));

        let pool = BackendPool::from_config(&config).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.backends()[0].weight(), 3);
        assert_eq!(pool.backends()[1].weight(), 1);
    }

    #[test]
    fn mark_down_partitions_alive_first() {
        let pool = pool_of(3);
        assert!(pool.mark_down("http://127.0.0.1:9000/"));

        assert!(!pool.backends()[0].is_alive());
        assert_eq!(
            ordered_addresses(&pool),
            vec![
                "http://127.0.0.1:9001/",
                "http://127.0.0.1:9002/",
                "http://127.0.0.1:9000/",
            ]
        );

        pool.set_alive(&pool.backends()[0], true);
        assert_eq!(
            ordered_addresses(&pool),
            vec![
                "http://127.0.0.1:9000/",
                "http://127.0.0.1:9001/",
                "http://127.0.0.1:9002/",
            ]
        );
    }

    #[test]
    fn mark_down_unknown_address_is_noop() {
        let pool = pool_of(2);
        assert!(!pool.mark_down("http://10.0.0.1:1/"));
        assert!(pool.backends().iter().all(|b| b.is_alive()));
    }

    #[test]
    fn dead_backend_is_never_selected_until_revived() {
        let pool = pool_of(3);
        let victim = pool.backends()[1].clone();
        pool.mark_down(victim.address());

        for _ in 0..20 {
            assert_ne!(pool.next_peer().unwrap().address(), victim.address());
        }

        pool.set_alive(&victim, true);
        let seen: Vec<_> = (0..3).map(|_| pool.next_peer().unwrap()).collect();
        assert!(seen.iter().any(|b| b.address() == victim.address()));
    }

    #[test]
    fn all_dead_has_no_peer() {
        let pool = pool_of(2);
        for b in pool.backends() {
            pool.set_alive(b, false);
        }
        assert!(pool.next_peer().is_none());
    }

    #[test]
    fn concurrent_liveness_flips_keep_ordering_consistent() {
        let pool = Arc::new(pool_of(6));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let backend = pool.backends()[i].clone();
                        pool.set_alive(&backend, round % 2 == 1);
                        let _ = pool.next_peer();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Every thread ends on alive = true.
        let ordered = pool.ordered();
        assert_eq!(ordered.len(), 6);
        assert!(ordered.iter().all(|b| b.is_alive()));
        assert!(pool.next_peer().is_some());
    }

    fn weighted_pool(selector: WeightedRoundRobin, weights: &[u32]) -> BackendPool {
        let mut pool = BackendPool::new(Box::new(selector));
        for (i, weight) in weights.iter().enumerate() {
            let url = Url::parse(&format!("http://127.0.0.1:{}", 9000 + i)).unwrap();
            pool.register(Backend::new(url, *weight));
        }
        pool
    }

    fn next_ports(pool: &BackendPool, n: usize) -> Vec<u16> {
        (0..n)
            .map(|_| pool.next_peer().unwrap().url().port().unwrap())
            .collect()
    }

    #[test]
    fn weighted_run_stays_with_its_backend_when_liveness_changes() {
        let pool = weighted_pool(WeightedRoundRobin::new(), &[3, 1, 1]);
        assert_eq!(next_ports(&pool, 1), vec![9000]);

        // A reshuffled alive-first ordering must not hand the run to 9001.
        pool.mark_down("http://127.0.0.1:9000/");
        assert_eq!(next_ports(&pool, 4), vec![9000, 9000, 9001, 9002]);
    }

    #[test]
    fn weighted_skip_dead_moves_on_when_run_owner_dies() {
        let pool = weighted_pool(WeightedRoundRobin::skipping_dead(), &[3, 1, 1]);
        assert_eq!(next_ports(&pool, 1), vec![9000]);

        pool.mark_down("http://127.0.0.1:9000/");
        assert_eq!(next_ports(&pool, 4), vec![9001, 9002, 9001, 9002]);
    }
}
