//! Consecutive-failure circuit breaker for polling loops.
//!
//! Counts transient failures in a row and trips once the count reaches the
//! threshold. A single success closes it again. Fatal failures never reach
//! the breaker; the polling loop terminates on them directly.
//!
//! # State Machine
//!
//! ```text
//! Closed --record_failure() x threshold--> Tripped
//! Closed | Tripped --record_success()--> Closed (counter = 0)
//! ```
//!
//! The breaker is owned by exactly one polling loop, so it needs no
//! interior mutability.

/// Default number of consecutive transient failures before tripping.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Failures below threshold, polling continues.
    Closed,
    /// Threshold reached, polling should stop.
    Tripped,
}

/// Counts consecutive transient failures.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    threshold: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl CircuitBreaker {
    /// Creates a breaker that trips after `threshold` failures in a row.
    ///
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Resets the failure counter.
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            tracing::debug!(
                previous_failures = self.consecutive_failures,
                "Circuit breaker reset after success"
            );
        }
        self.consecutive_failures = 0;
    }

    /// Records one transient failure.
    ///
    /// Returns `true` exactly once: on the call at which the counter reaches
    /// the threshold. Later failures keep counting but return `false`.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures == self.threshold
    }

    /// Current count of consecutive failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Configured trip threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current state.
    pub fn state(&self) -> BreakerState {
        if self.consecutive_failures >= self.threshold {
            BreakerState::Tripped
        } else {
            BreakerState::Closed
        }
    }
}
