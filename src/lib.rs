//! # Eddy
//!
//! > *Water that turns back on itself*
//!
//! A retry execution engine: re-invoke a fallible async operation under a
//! backoff policy, bounded by an attempt ceiling and a lightweight circuit
//! breaker, with cooperative cancellation between attempts.
//!
//! ## Quick Example
//!
//! ```rust
//! use eddy::{run, RetryOutcome, RetryPolicy, TransientError};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::linear(Duration::from_millis(1))
//!     .with_max_retries(5)
//!     .with_breaker_threshold(2);
//!
//! // Always failing: the breaker opens after two failures.
//! let outcome = run(
//!     || async { Err::<(), _>(TransientError::Network) },
//!     &policy,
//!     &CancellationToken::new(),
//! )
//! .await;
//!
//! assert_eq!(outcome, RetryOutcome::CircuitOpen { attempts: 2 });
//! # });
//! ```
//!
//! ## Features
//!
//! - `http` (default): [`middleware::RetryLayer`], a `tower` layer that retries 5xx responses
//! - `tracing` (default): structured log events from the retry loop and middleware
//! - `serde`: `Serialize`/`Deserialize` for [`RetryPolicy`] so it can live in config files

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

#[cfg(feature = "http")]
pub mod middleware;
pub mod retry;

// Re-exports
pub use retry::{
    apply_jitter, calculate_backoff, run, run_with_breaker, run_with_hooks, BackoffStrategy,
    CircuitBreaker, Classification, CustomBackoff, HttpError, RetryError, RetryEvent,
    RetryExhausted, RetryOutcome, RetryPolicy, TransientError, DEFAULT_BACKOFF_FACTOR,
    DEFAULT_BREAKER_THRESHOLD, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES,
    DEFAULT_SUCCESS_RESET,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        run, run_with_hooks, BackoffStrategy, CircuitBreaker, HttpError, RetryEvent,
        RetryOutcome, RetryPolicy,
    };
}
