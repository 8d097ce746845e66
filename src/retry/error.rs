//! Outcome and error types for retry runs.

use std::fmt;
use std::time::Duration;

/// Terminal result of one retry run.
///
/// Exactly one outcome is produced per run and handed to the caller; no
/// outcome is ever raised as a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded.
    Succeeded {
        /// The value produced by the successful attempt.
        value: T,
        /// Invocations made, including the successful one.
        attempts: u32,
    },
    /// Every allowed attempt failed.
    ExhaustedRetries(RetryExhausted<E>),
    /// The circuit breaker refused the next attempt.
    CircuitOpen {
        /// Invocations made before the breaker opened.
        attempts: u32,
    },
    /// Cancellation (or the run's time budget) fired while waiting to retry.
    Cancelled {
        /// Invocations made before cancellation.
        attempts: u32,
    },
    /// The failure was classified as not retryable under enforced classification.
    NotRetryable {
        /// The rejected error.
        error: E,
        /// Invocations made, including the rejected one.
        attempts: u32,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Returns true for [`RetryOutcome::Succeeded`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::CircuitOpen { attempts }
            | Self::Cancelled { attempts }
            | Self::NotRetryable { attempts, .. } => *attempts,
            Self::ExhaustedRetries(exhausted) => exhausted.attempts,
        }
    }

    /// Convert into a `Result`, dropping attempt metadata on success.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::{RetryError, RetryOutcome};
    ///
    /// let outcome: RetryOutcome<(), String> = RetryOutcome::CircuitOpen { attempts: 2 };
    /// let err = outcome.into_result().unwrap_err();
    ///
    /// assert!(matches!(err, RetryError::CircuitOpen));
    /// assert_eq!(err.to_string(), "operation failed due to circuit breaker");
    /// ```
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::ExhaustedRetries(exhausted) => Err(RetryError::ExhaustedRetries(exhausted)),
            Self::CircuitOpen { .. } => Err(RetryError::CircuitOpen),
            Self::Cancelled { .. } => Err(RetryError::Cancelled),
            Self::NotRetryable { error, .. } => Err(RetryError::NotRetryable(error)),
        }
    }
}

/// Error view of the failing [`RetryOutcome`] variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The circuit breaker opened before the operation could succeed.
    CircuitOpen,
    /// Every allowed attempt failed.
    ExhaustedRetries(RetryExhausted<E>),
    /// The run was cancelled between attempts.
    Cancelled,
    /// The operation failed with an error that is not retried.
    NotRetryable(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => f.write_str("operation failed due to circuit breaker"),
            Self::ExhaustedRetries(exhausted) => write!(
                f,
                "operation failed after maximum retries ({} attempts): {}",
                exhausted.attempts, exhausted.final_error
            ),
            Self::Cancelled => f.write_str("operation canceled due to context timeout"),
            Self::NotRetryable(e) => write!(f, "operation failed with non-retryable error: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ExhaustedRetries(exhausted) => Some(&exhausted.final_error),
            Self::NotRetryable(e) => Some(e),
            Self::CircuitOpen | Self::Cancelled => None,
        }
    }
}

/// Error returned when all retry attempts are exhausted.
///
/// Contains the final error along with metadata about the retry sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the final attempt.
    pub final_error: E,
    /// Total number of attempts made.
    pub attempts: u32,
    /// Total time spent retrying.
    pub total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new RetryExhausted error.
    pub fn new(final_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// Get a reference to the final error.
    pub fn error(&self) -> &E {
        &self.final_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts ({:?}): {}",
            self.attempts, self.total_duration, self.final_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}

/// Failure reported for a server-error HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    /// The response status code.
    pub status: u16,
    /// Short description of the failure.
    pub message: String,
}

impl HttpError {
    /// Create an HTTP error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpError {}

/// Common transient failures, usable as retryable sentinels.
///
/// ```rust
/// use eddy::{RetryPolicy, TransientError};
///
/// let policy = RetryPolicy::new().with_retryable_errors([TransientError::Network]);
/// assert!(policy.is_retryable(&TransientError::Network));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientError {
    /// A failure expected to clear up by itself.
    Temporary,
    /// The network was unreachable or the connection dropped.
    Network,
    /// The remote side did not answer in time.
    Timeout,
}

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary => f.write_str("temporary error"),
            Self::Network => f.write_str("network failure"),
            Self::Timeout => f.write_str("timeout occurred"),
        }
    }
}

impl std::error::Error for TransientError {}
