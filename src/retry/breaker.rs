//! Consecutive-failure circuit breaker.
//!
//! # States
//! - Closed: `failures < threshold`, attempts are allowed
//! - Open: `failures >= threshold`, attempts are refused
//!
//! There is no half-open probe and no timed recovery. The breaker closes only
//! through [`CircuitBreaker::reset`], called directly or reached by recording
//! `success_reset` consecutive successes.
//!
//! A breaker is owned by one run and mutated through `&mut self`; sharing one
//! between concurrent runs needs external synchronization.

use super::policy::RetryPolicy;

/// Failure-counting gate for a single retry run.
///
/// # Examples
///
/// ```rust
/// use eddy::CircuitBreaker;
///
/// let mut breaker = CircuitBreaker::new(2, 1);
/// breaker.record_failure();
/// assert!(breaker.should_retry());
///
/// breaker.record_failure();
/// assert!(!breaker.should_retry());
///
/// breaker.record_success();
/// assert!(breaker.should_retry());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreaker {
    failures: u32,
    successes: u32,
    threshold: u32,
    success_reset: u32,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    ///
    /// A `threshold` of zero produces a breaker that is open from the start.
    pub fn new(threshold: u32, success_reset: u32) -> Self {
        Self {
            failures: 0,
            successes: 0,
            threshold,
            success_reset,
        }
    }

    /// Create a breaker from a policy's threshold and success-reset count.
    pub fn from_policy<E>(policy: &RetryPolicy<E>) -> Self {
        Self::new(policy.breaker_threshold(), policy.success_reset())
    }

    /// Returns true while the breaker is closed.
    pub fn should_retry(&self) -> bool {
        self.failures < self.threshold
    }

    /// Returns true once the failure threshold has been reached.
    pub fn is_open(&self) -> bool {
        !self.should_retry()
    }

    /// Count a failure and break any run of successes.
    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        self.successes = 0;
    }

    /// Count a success; enough of them in a row reset the breaker.
    pub fn record_success(&mut self) {
        self.successes = self.successes.saturating_add(1);
        if self.successes >= self.success_reset {
            self.reset();
        }
    }

    /// Zero both counters, closing the breaker.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.successes = 0;
    }

    /// Consecutive failures recorded since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Consecutive successes recorded since the last failure or reset.
    pub fn successes(&self) -> u32 {
        self.successes
    }

    /// Failures needed to open the breaker.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Successes needed to reset the breaker.
    pub fn success_reset(&self) -> u32 {
        self.success_reset
    }
}
