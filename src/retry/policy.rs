//! Retry policy types and configuration.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::backoff::calculate_backoff;
use super::error::HttpError;

/// Attempt ceiling substituted when a policy asks for zero attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Default cap applied by linear and exponential backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);
/// Default growth factor for exponential backoff.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
/// Default number of consecutive failures that opens the circuit breaker.
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
/// Default number of consecutive successes that closes the circuit breaker.
pub const DEFAULT_SUCCESS_RESET: u32 = 1;

/// A retry policy describing how to retry failed operations.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// A policy is read-only for the duration of a run, so one value can be shared
/// (for example behind an `Arc`) by any number of concurrent callers.
///
/// The type parameter is the operation's error type; it is needed because the
/// set of retryable sentinel errors holds values of that type.
///
/// # Examples
///
/// ```rust
/// use eddy::{BackoffStrategy, RetryPolicy};
/// use std::time::Duration;
///
/// let policy: RetryPolicy<String> = RetryPolicy::exponential(Duration::from_millis(100))
///     .with_max_retries(5)
///     .with_max_backoff(Duration::from_secs(2))
///     .with_jitter(0.1);
///
/// assert_eq!(policy.max_retries(), 5);
/// assert!(matches!(policy.strategy(), BackoffStrategy::Exponential));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy<E> {
    max_retries: u32,
    max_retry_timeout: Option<Duration>,
    initial_backoff: Duration,
    max_backoff: Duration,
    backoff_factor: f64,
    jitter_factor: f64,
    strategy: BackoffStrategy,
    #[cfg_attr(feature = "serde", serde(skip))]
    retryable_errors: Vec<E>,
    retryable_status_codes: Vec<u16>,
    breaker_threshold: u32,
    success_reset: u32,
    classification: Classification,
}

/// The backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BackoffStrategy {
    /// Every retry waits the initial delay.
    #[default]
    Fixed,
    /// Delay grows by the initial delay each retry: initial * (attempt + 1).
    Linear,
    /// Delay grows geometrically: initial * factor^attempt, then jittered.
    Exponential,
    /// Delay is computed by a caller-supplied function of the attempt index.
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(CustomBackoff),
}

/// A caller-supplied delay function, keyed by the 0-based attempt index.
#[derive(Clone)]
pub struct CustomBackoff(Arc<dyn Fn(u32) -> Duration + Send + Sync>);

impl CustomBackoff {
    /// Wrap a delay function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluate the function for the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        (self.0)(attempt)
    }
}

impl fmt::Debug for CustomBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomBackoff(..)")
    }
}

impl PartialEq for CustomBackoff {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Whether failure classification decides if a retry happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Classification {
    /// Every error is retried up to the ceiling; classification is only reported.
    #[default]
    Passthrough,
    /// Errors that [`RetryPolicy::is_retryable`] rejects end the run immediately.
    Enforced,
}

/// Information about a retry decision, passed to hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The attempt ceiling in effect for this run.
    pub max_retries: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before next attempt, or `None` when this was the last one.
    pub next_delay: Option<Duration>,
    /// Total elapsed time since first attempt.
    pub elapsed: Duration,
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_retry_timeout: None,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            jitter_factor: 0.0,
            strategy: BackoffStrategy::Fixed,
            retryable_errors: Vec::new(),
            retryable_status_codes: Vec::new(),
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            success_reset: DEFAULT_SUCCESS_RESET,
            classification: Classification::Passthrough,
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Create a policy with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that waits `delay` before every retry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy: RetryPolicy<()> = RetryPolicy::fixed(Duration::from_millis(500));
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
    /// assert_eq!(policy.delay_for_attempt(7), Duration::from_millis(500));
    /// ```
    pub fn fixed(delay: Duration) -> Self {
        Self::default()
            .with_initial_backoff(delay)
            .with_strategy(BackoffStrategy::Fixed)
    }

    /// Create a policy with linearly increasing delay.
    ///
    /// Delay = initial * (attempt + 1), capped at the maximum backoff.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy: RetryPolicy<()> = RetryPolicy::linear(Duration::from_millis(100));
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(300));
    /// ```
    pub fn linear(initial: Duration) -> Self {
        Self::default()
            .with_initial_backoff(initial)
            .with_strategy(BackoffStrategy::Linear)
    }

    /// Create a policy with exponentially increasing delay.
    ///
    /// Delay = initial * factor^attempt, capped at the maximum backoff and then
    /// perturbed by the jitter fraction (zero unless [`with_jitter`](Self::with_jitter)
    /// is used).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy: RetryPolicy<()> = RetryPolicy::exponential(Duration::from_millis(100));
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    /// ```
    pub fn exponential(initial: Duration) -> Self {
        Self::default()
            .with_initial_backoff(initial)
            .with_strategy(BackoffStrategy::Exponential)
    }

    /// Create a policy whose delays come from `f`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy: RetryPolicy<()> =
    ///     RetryPolicy::custom(|attempt| Duration::from_millis(50 * u64::from(attempt + 1)));
    ///
    /// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(200));
    /// ```
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::default().with_custom_backoff(f)
    }

    /// Set the attempt ceiling. Zero means "use [`DEFAULT_MAX_RETRIES`]".
    ///
    /// Unlike a retry count, this counts every invocation: `with_max_retries(3)`
    /// allows at most 3 calls of the operation.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Bound the wall-clock time of a whole run.
    ///
    /// The budget is checked while waiting between attempts; a run whose
    /// budget runs out during a wait ends as cancelled.
    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.max_retry_timeout = Some(timeout);
        self
    }

    /// Set the initial delay.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set the cap for linear and exponential delays.
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Set the exponential growth factor.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Add proportional jitter to exponential delays.
    ///
    /// The factor determines the range of randomness. For example, `0.25` means
    /// the actual delay will be ±25% of the capped delay. Values outside
    /// `[0, 1]` are clamped.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = if factor.is_nan() {
            0.0
        } else {
            factor.clamp(0.0, 1.0)
        };
        self
    }

    /// Select the backoff strategy.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Use a caller-supplied delay function.
    pub fn with_custom_backoff<F>(self, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.with_strategy(BackoffStrategy::Custom(CustomBackoff::new(f)))
    }

    /// Errors that classify as retryable when they compare equal to the failure.
    pub fn with_retryable_errors<I>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = E>,
    {
        self.retryable_errors = errors.into_iter().collect();
        self
    }

    /// HTTP status codes that classify an [`HttpError`] as retryable.
    pub fn with_retryable_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Consecutive failures that open the circuit breaker.
    ///
    /// Zero keeps the breaker permanently open, so no attempt is ever made.
    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker_threshold = threshold;
        self
    }

    /// Consecutive successes that reset the circuit breaker.
    pub fn with_success_reset(mut self, successes: u32) -> Self {
        self.success_reset = successes;
        self
    }

    /// Choose whether classification gates retries.
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    /// Get the configured attempt ceiling (possibly zero).
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the attempt ceiling a run will actually use.
    ///
    /// ```rust
    /// use eddy::{RetryPolicy, DEFAULT_MAX_RETRIES};
    ///
    /// let policy: RetryPolicy<()> = RetryPolicy::new().with_max_retries(0);
    /// assert_eq!(policy.effective_max_retries(), DEFAULT_MAX_RETRIES);
    /// ```
    pub fn effective_max_retries(&self) -> u32 {
        if self.max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            self.max_retries
        }
    }

    /// Get the wall-clock budget for a run.
    pub fn max_retry_timeout(&self) -> Option<Duration> {
        self.max_retry_timeout
    }

    /// Get the initial delay.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Get the delay cap.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Get the exponential growth factor.
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Get the jitter fraction.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Get the backoff strategy.
    pub fn strategy(&self) -> &BackoffStrategy {
        &self.strategy
    }

    /// Get the retryable sentinel errors.
    pub fn retryable_errors(&self) -> &[E] {
        &self.retryable_errors
    }

    /// Get the retryable HTTP status codes.
    pub fn retryable_status_codes(&self) -> &[u16] {
        &self.retryable_status_codes
    }

    /// Get the breaker failure threshold.
    pub fn breaker_threshold(&self) -> u32 {
        self.breaker_threshold
    }

    /// Get the breaker success-reset count.
    pub fn success_reset(&self) -> u32 {
        self.success_reset
    }

    /// Get the classification mode.
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Calculate the delay to wait after failed attempt N (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        calculate_backoff(self, attempt)
    }

    /// Decide whether an error is worth retrying.
    ///
    /// An error is retryable when it equals one of the configured sentinel
    /// errors, or when it is an [`HttpError`] whose status is one of the
    /// configured status codes. Messages are never compared.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::{HttpError, RetryPolicy};
    ///
    /// let policy = RetryPolicy::new().with_retryable_status_codes([502, 503]);
    ///
    /// assert!(policy.is_retryable(&HttpError::new(503, "unavailable")));
    /// assert!(!policy.is_retryable(&HttpError::new(500, "boom")));
    /// ```
    pub fn is_retryable(&self, error: &E) -> bool
    where
        E: PartialEq + 'static,
    {
        if self.retryable_errors.iter().any(|candidate| candidate == error) {
            return true;
        }

        match (error as &dyn Any).downcast_ref::<HttpError>() {
            Some(http) => self.retryable_status_codes.contains(&http.status),
            None => false,
        }
    }
}
