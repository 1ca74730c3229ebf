//! Consecutive-failure circuit breaker for scheduled ticks.
//!
//! Every tick reports success or failure. Once failures reach the threshold
//! without an intervening success the circuit *opens* and monitoring is
//! disabled. There is no half-open probe: recovery needs an explicit
//! restart or a settings re-apply, which builds a fresh breaker.

use chrono::{DateTime, Utc};

/// Default consecutive failures before monitoring is disabled.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy; ticks keep being scheduled.
    Closed,
    /// Tripped; monitoring must stop.
    Open,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    last_failure: Option<DateTime<Utc>>,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            last_failure: None,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Record a success, resetting the counter.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
    }

    /// Record a failure and return the resulting state.
    pub fn record_failure(&mut self) -> CircuitState {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(Utc::now());
        self.state()
    }

    pub fn state(&self) -> CircuitState {
        if self.consecutive_failures >= self.failure_threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.last_failure
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}
