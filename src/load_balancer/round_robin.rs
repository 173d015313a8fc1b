//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, PeerSelector};

/// Round-robin selector.
///
/// Advances a shared cursor on every call and scans one full cycle from
/// there for an alive backend. When the winner is not the first candidate the
/// cursor is moved onto it, so the next call starts past the dead run instead
/// of scanning it again.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary cursor value (the first pick is `cursor + 1`).
    pub fn starting_at(cursor: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(cursor),
        }
    }

    fn next_index(&self, len: usize) -> usize {
        self.cursor.fetch_add(1, Ordering::AcqRel).wrapping_add(1) % len
    }
}

impl PeerSelector for RoundRobin {
    fn next_peer(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let next = self.next_index(len);
        for i in next..next + len {
            let index = i % len;
            let backend = &backends[index];
            if backend.is_alive() {
                if i != next {
                    self.cursor.store(index, Ordering::Release);
                }
                return Some(backend.clone());
            }
        }
        None
    }
}
