//! Retry execution with backoff and circuit breaking.
//!
//! The pieces, from the bottom up:
//!
//! - [`calculate_backoff`]: pure delay calculation for a policy and attempt index
//! - [`CircuitBreaker`]: consecutive-failure gate owned by one run
//! - [`RetryPolicy`]: immutable description of how to retry
//! - [`run`]: the loop that ties them together
//!
//! # Quick Start
//!
//! ```rust
//! use eddy::{run, RetryOutcome, RetryPolicy};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_max_retries(3)
//!     .with_jitter(0.2);
//!
//! let outcome = run(|| async { Ok::<_, String>(42) }, &policy, &CancellationToken::new()).await;
//!
//! assert_eq!(outcome, RetryOutcome::Succeeded { value: 42, attempts: 1 });
//! # });
//! ```
//!
//! # Backoff Strategies
//!
//! - **Fixed**: the initial delay every time
//! - **Linear**: 100ms, 200ms, 300ms, ... up to the cap
//! - **Exponential**: 100ms, 200ms, 400ms, ... up to the cap, with optional jitter
//! - **Custom**: any `Fn(u32) -> Duration`
//!
//! # Outcomes
//!
//! A run ends in exactly one [`RetryOutcome`]: success, exhausted retries
//! (carrying the last error), an open circuit, cancellation, or, with
//! [`Classification::Enforced`], a non-retryable error.

mod backoff;
mod breaker;
mod engine;
mod error;
mod policy;

pub use backoff::{apply_jitter, calculate_backoff};
pub use breaker::CircuitBreaker;
pub use engine::{run, run_with_breaker, run_with_hooks};
pub use error::{HttpError, RetryError, RetryExhausted, RetryOutcome, TransientError};
pub use policy::{
    BackoffStrategy, Classification, CustomBackoff, RetryEvent, RetryPolicy,
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BREAKER_THRESHOLD, DEFAULT_INITIAL_BACKOFF,
    DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_SUCCESS_RESET,
};
