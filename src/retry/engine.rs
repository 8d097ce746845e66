//! The retry loop.
//!
//! A run invokes the operation, consults the circuit breaker before every
//! attempt, and waits out the backoff delay between attempts. The wait is the
//! only suspension point that observes cancellation: an attempt that has
//! started always runs to completion.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::breaker::CircuitBreaker;
use super::error::{RetryExhausted, RetryOutcome};
use super::policy::{Classification, RetryEvent, RetryPolicy};

/// Run `operation` until it succeeds or the policy gives up.
///
/// Every failure is retried up to the policy's ceiling unless the policy uses
/// [`Classification::Enforced`]. A fresh [`CircuitBreaker`] is built from the
/// policy for this run only.
///
/// # Examples
///
/// ```rust
/// use eddy::{run, RetryOutcome, RetryPolicy};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::fixed(Duration::from_millis(1)).with_max_retries(3);
/// let mut calls = 0;
///
/// let outcome = run(
///     || {
///         calls += 1;
///         let n = calls;
///         async move { if n < 3 { Err("transient") } else { Ok(n) } }
///     },
///     &policy,
///     &CancellationToken::new(),
/// )
/// .await;
///
/// assert_eq!(outcome, RetryOutcome::Succeeded { value: 3, attempts: 3 });
/// # });
/// ```
pub async fn run<T, E, F, Fut>(
    operation: F,
    policy: &RetryPolicy<E>,
    cancel: &CancellationToken,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: PartialEq + fmt::Debug + 'static,
{
    run_with_hooks(operation, policy, cancel, |_: &RetryEvent<'_, E>| {}).await
}

/// Run with a hook for observability.
///
/// `on_retry` is called once for each failed attempt that reaches a retry
/// decision: with the computed delay before waiting, or with `next_delay:
/// None` when the ceiling has been reached. The callback is synchronous and
/// should not block; use it for logging and metrics.
pub async fn run_with_hooks<T, E, F, Fut, H>(
    operation: F,
    policy: &RetryPolicy<E>,
    cancel: &CancellationToken,
    on_retry: H,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: PartialEq + fmt::Debug + 'static,
    H: Fn(&RetryEvent<'_, E>),
{
    let mut breaker = CircuitBreaker::from_policy(policy);
    run_with_breaker(operation, policy, cancel, &mut breaker, on_retry).await
}

/// Run against a caller-owned circuit breaker.
///
/// The breaker keeps its state when the run returns, so a caller can carry
/// failure counts across sequential runs. It is reset when an attempt
/// succeeds.
pub async fn run_with_breaker<T, E, F, Fut, H>(
    mut operation: F,
    policy: &RetryPolicy<E>,
    cancel: &CancellationToken,
    breaker: &mut CircuitBreaker,
    on_retry: H,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: PartialEq + fmt::Debug + 'static,
    H: Fn(&RetryEvent<'_, E>),
{
    let max_retries = policy.effective_max_retries();
    let start = Instant::now();
    let deadline = policy
        .max_retry_timeout()
        .and_then(|budget| start.checked_add(budget));

    #[cfg(feature = "tracing")]
    tracing::debug!(
        max_retries,
        strategy = ?policy.strategy(),
        "starting retry run"
    );

    let mut attempt = 0u32;
    loop {
        if !breaker.should_retry() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempts = attempt,
                failures = breaker.failures(),
                "circuit breaker open, stopping retries"
            );
            return RetryOutcome::CircuitOpen { attempts: attempt };
        }

        let error = match operation().await {
            Ok(value) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt = attempt + 1, "operation succeeded");
                breaker.reset();
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt + 1,
                };
            }
            Err(error) => error,
        };

        let retryable = policy.is_retryable(&error);
        if policy.classification() == Classification::Enforced && !retryable {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempt = attempt + 1,
                error = ?error,
                "non-retryable error, stopping retries"
            );
            return RetryOutcome::NotRetryable {
                error,
                attempts: attempt + 1,
            };
        }

        if attempt + 1 >= max_retries {
            on_retry(&RetryEvent {
                attempt: attempt + 1,
                max_retries,
                error: &error,
                next_delay: None,
                elapsed: start.elapsed(),
            });
            #[cfg(feature = "tracing")]
            tracing::warn!(
                attempts = attempt + 1,
                error = ?error,
                "max retries reached"
            );
            return RetryOutcome::ExhaustedRetries(RetryExhausted::new(
                error,
                attempt + 1,
                start.elapsed(),
            ));
        }

        breaker.record_failure();
        let delay = policy.delay_for_attempt(attempt);

        on_retry(&RetryEvent {
            attempt: attempt + 1,
            max_retries,
            error: &error,
            next_delay: Some(delay),
            elapsed: start.elapsed(),
        });
        #[cfg(feature = "tracing")]
        tracing::warn!(
            attempt = attempt + 1,
            max_retries,
            error = ?error,
            retryable,
            delay = ?delay,
            "retrying after error"
        );

        if !wait_or_cancel(delay, cancel, deadline).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(attempts = attempt + 1, "retry run cancelled");
            return RetryOutcome::Cancelled {
                attempts: attempt + 1,
            };
        }

        attempt += 1;
    }
}

/// Sleep for `delay`; returns false if cancellation or the deadline wins.
async fn wait_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> bool {
    let budget = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = budget => false,
        () = tokio::time::sleep(delay) => true,
    }
}
