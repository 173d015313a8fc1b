//! Retry and failover state machine.
//!
//! # States
//! ```text
//! SELECT_PEER → FORWARD → SUCCESS (terminal)
//!                       → FAIL → RETRY_SAME (up to max_retries, fixed backoff)
//!                              → MARK_DOWN → SELECT_PEER (up to max_attempts)
//!                                          → FAIL_TERMINAL (503)
//! ```
//!
//! # Design Decisions
//! - Counters are an explicit value threaded through the dispatch loop
//! - `retries` resets whenever a new peer is selected
//! - Worst case per request: max_attempts × (1 + max_retries) forwards

use std::time::Duration;

use crate::config::RetryConfig;

/// Per-request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchState {
    /// Dispatch attempts so far, starting at 1.
    pub attempts: u32,
    /// Retries against the currently selected backend, starting at 0.
    pub retries: u32,
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            attempts: 1,
            retries: 0,
        }
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}

/// What to do after a failed forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Wait, then forward to the same backend again.
    RetrySame(Duration),
    /// Give up on this backend: mark it down and select a new peer.
    Failover,
}

/// Retry budget for one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Whether the request has used up its dispatch attempts.
    pub fn attempts_exhausted(&self, state: &DispatchState) -> bool {
        state.attempts > self.max_attempts
    }

    /// Advance `state` after a forwarding failure and say what comes next.
    pub fn on_failure(&self, state: &mut DispatchState) -> FailureAction {
        if state.retries < self.max_retries {
            state.retries += 1;
            FailureAction::RetrySame(self.backoff)
        } else {
            state.attempts += 1;
            state.retries = 0;
            FailureAction::Failover
        }
    }

    /// Upper bound on forwards for a single inbound request.
    pub fn max_forwards(&self) -> u32 {
        self.max_attempts.saturating_mul(self.max_retries.saturating_add(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_same_backend_then_fails_over() {
        let policy = RetryPolicy::default();
        let mut state = DispatchState::new();

        for expected in 1..=3 {
            assert_eq!(
                policy.on_failure(&mut state),
                FailureAction::RetrySame(Duration::from_millis(10))
            );
            assert_eq!(state, DispatchState { attempts: 1, retries: expected });
        }

        assert_eq!(policy.on_failure(&mut state), FailureAction::Failover);
        assert_eq!(state, DispatchState { attempts: 2, retries: 0 });
        assert!(!policy.attempts_exhausted(&state));
    }

    #[test]
    fn budget_is_three_by_three() {
        let policy = RetryPolicy::default();
        let mut state = DispatchState::new();
        let mut forwards = 0;

        while !policy.attempts_exhausted(&state) {
            forwards += 1;
            let _ = policy.on_failure(&mut state);
        }

        assert_eq!(forwards, 12);
        assert_eq!(forwards, policy.max_forwards());
        assert_eq!(state.attempts, 4);
    }

    #[test]
    fn zero_retries_fails_over_immediately() {
        let policy = RetryPolicy {
            max_attempts: 2,
            max_retries: 0,
            backoff: Duration::ZERO,
        };
        let mut state = DispatchState::new();
        assert_eq!(policy.on_failure(&mut state), FailureAction::Failover);
        assert_eq!(policy.on_failure(&mut state), FailureAction::Failover);
        assert!(policy.attempts_exhausted(&state));
    }
}
