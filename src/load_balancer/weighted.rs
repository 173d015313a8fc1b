//! Weighted round-robin load balancing strategy.
//!
//! Each backend receives `weight` consecutive picks before the rotation moves
//! on, so `[A:3, B:1]` yields `A, A, A, B, A, A, A, B, ...`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::load_balancer::{backend::Backend, PeerSelector};

/// Rotation position and the picks left for the current backend.
#[derive(Debug, Default)]
struct Rotation {
    current: usize,
    next: usize,
    remaining: u64,
}

/// Weighted round-robin selector.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    rotation: Mutex<Rotation>,
    skip_dead: bool,
}

impl WeightedRoundRobin {
    /// Rotation that hands out a dead backend's turn like any other.
    ///
    /// Selection only reports "no peer" when every backend is dead; a dead
    /// backend inside the rotation is left to the dispatcher's failover.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation that moves past dead backends, like plain round robin does.
    pub fn skipping_dead() -> Self {
        Self {
            rotation: Mutex::default(),
            skip_dead: true,
        }
    }
}

impl PeerSelector for WeightedRoundRobin {
    fn next_peer(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }
        if !self.skip_dead && !backends.iter().any(|b| b.is_alive()) {
            return None;
        }

        let mut rotation = self.rotation.lock();

        let current_dead = self.skip_dead && !backends[rotation.current % len].is_alive();
        if rotation.remaining == 0 || current_dead {
            let probes = if self.skip_dead { len } else { 1 };
            let index = (0..probes)
                .map(|step| (rotation.next + step) % len)
                .find(|&index| !self.skip_dead || backends[index].is_alive())?;

            rotation.current = index;
            rotation.next = (index + 1) % len;
            rotation.remaining = backends[index].weight().max(1);
        }

        rotation.remaining -= 1;
        Some(backends[rotation.current].clone())
    }

    fn alive_first(&self) -> bool {
        false
    }
}
