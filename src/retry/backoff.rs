//! Backoff delay calculation.
//!
//! Everything here is a pure function of the policy and the attempt index,
//! except for the random sample drawn for exponential jitter.

use std::time::Duration;

use rand::Rng;

use super::policy::{BackoffStrategy, RetryPolicy};

/// Compute the delay to wait after failed attempt `attempt` (0-indexed).
///
/// - Fixed: the initial delay.
/// - Linear: `initial + attempt * initial`, capped at the maximum delay.
/// - Exponential: `initial * factor^attempt`, capped at the maximum delay,
///   then moved by up to `±jitter_factor` of the capped value. Jitter is
///   applied after the cap, so the result may land slightly above it.
/// - Custom: whatever the caller's function returns.
///
/// # Examples
///
/// ```rust
/// use eddy::{calculate_backoff, RetryPolicy};
/// use std::time::Duration;
///
/// let policy: RetryPolicy<()> = RetryPolicy::linear(Duration::from_millis(100))
///     .with_max_backoff(Duration::from_millis(250));
///
/// assert_eq!(calculate_backoff(&policy, 0), Duration::from_millis(100));
/// assert_eq!(calculate_backoff(&policy, 1), Duration::from_millis(200));
/// assert_eq!(calculate_backoff(&policy, 2), Duration::from_millis(250));
/// ```
pub fn calculate_backoff<E>(policy: &RetryPolicy<E>, attempt: u32) -> Duration {
    let initial = policy.initial_backoff();

    match policy.strategy() {
        BackoffStrategy::Fixed => initial,
        BackoffStrategy::Linear => initial
            .saturating_add(initial.saturating_mul(attempt))
            .min(policy.max_backoff()),
        BackoffStrategy::Exponential => {
            let base = exponential_base(
                initial,
                policy.backoff_factor(),
                attempt,
                policy.max_backoff(),
            );
            apply_jitter(base, policy.jitter_factor(), unit_sample())
        }
        BackoffStrategy::Custom(f) => f.delay(attempt),
    }
}

/// Move `base` by `base * fraction * sample`.
///
/// `sample` is expected in `[-1, 1]` and `fraction` in `[0, 1]`; both are
/// clamped. The result never goes below zero.
///
/// ```rust
/// use eddy::apply_jitter;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(1000);
/// assert_eq!(apply_jitter(base, 0.1, 1.0), Duration::from_millis(1100));
/// assert_eq!(apply_jitter(base, 0.1, -1.0), Duration::from_millis(900));
/// assert_eq!(apply_jitter(base, 0.0, 1.0), base);
/// ```
pub fn apply_jitter(base: Duration, fraction: f64, sample: f64) -> Duration {
    if fraction.is_nan() || fraction <= 0.0 || sample.is_nan() {
        return base;
    }

    let fraction = fraction.min(1.0);
    let sample = sample.clamp(-1.0, 1.0);
    let base_nanos = base.as_nanos() as f64;

    nanos_to_duration(base_nanos + base_nanos * fraction * sample)
}

fn exponential_base(initial: Duration, factor: f64, attempt: u32, cap: Duration) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let scaled = initial.as_nanos() as f64 * factor.powi(exponent);

    if scaled.is_nan() || scaled >= cap.as_nanos() as f64 {
        return cap;
    }

    nanos_to_duration(scaled)
}

// `as` saturates: negatives become zero, overflow becomes u64::MAX.
fn nanos_to_duration(nanos: f64) -> Duration {
    Duration::from_nanos(nanos.round() as u64)
}

fn unit_sample() -> f64 {
    rand::rng().random_range(-1.0..=1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: BackoffStrategy) -> RetryPolicy<()> {
        RetryPolicy::new()
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(1))
            .with_strategy(strategy)
    }

    #[test]
    fn test_fixed_ignores_attempt() {
        let policy = policy(BackoffStrategy::Fixed);

        for attempt in [0, 1, 5, 50, u32::MAX] {
            assert_eq!(calculate_backoff(&policy, attempt), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_fixed_is_not_capped() {
        let policy: RetryPolicy<()> = RetryPolicy::fixed(Duration::from_secs(10))
            .with_max_backoff(Duration::from_secs(1));

        assert_eq!(calculate_backoff(&policy, 3), Duration::from_secs(10));
    }

    #[test]
    fn test_linear_grows_then_caps() {
        let policy = policy(BackoffStrategy::Linear);

        assert_eq!(calculate_backoff(&policy, 0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(&policy, 1), Duration::from_millis(200));
        assert_eq!(calculate_backoff(&policy, 4), Duration::from_millis(500));
        assert_eq!(calculate_backoff(&policy, 9), Duration::from_secs(1));
        assert_eq!(calculate_backoff(&policy, 10), Duration::from_secs(1));
        assert_eq!(calculate_backoff(&policy, u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_without_jitter() {
        let policy = policy(BackoffStrategy::Exponential);

        assert_eq!(calculate_backoff(&policy, 0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(&policy, 1), Duration::from_millis(200));
        assert_eq!(calculate_backoff(&policy, 2), Duration::from_millis(400));
        assert_eq!(calculate_backoff(&policy, 3), Duration::from_millis(800));
        assert_eq!(calculate_backoff(&policy, 4), Duration::from_secs(1)); // capped
        assert_eq!(calculate_backoff(&policy, 200), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_custom_factor() {
        let policy = policy(BackoffStrategy::Exponential).with_backoff_factor(3.0);

        assert_eq!(calculate_backoff(&policy, 1), Duration::from_millis(300));
        assert_eq!(calculate_backoff(&policy, 2), Duration::from_millis(900));
    }

    #[test]
    fn test_exponential_jitter_stays_in_band() {
        let policy = policy(BackoffStrategy::Exponential).with_jitter(0.5);

        for _ in 0..200 {
            let delay = calculate_backoff(&policy, 1);
            assert!(delay >= Duration::from_millis(100), "{:?}", delay);
            assert!(delay <= Duration::from_millis(300), "{:?}", delay);
        }
    }

    #[test]
    fn test_jitter_may_exceed_cap() {
        let capped = Duration::from_secs(1);
        assert_eq!(apply_jitter(capped, 0.2, 1.0), Duration::from_millis(1200));
        assert_eq!(apply_jitter(capped, 0.2, -1.0), Duration::from_millis(800));
    }

    #[test]
    fn test_jitter_clamps_inputs() {
        let base = Duration::from_millis(100);

        assert_eq!(apply_jitter(base, 3.0, -1.0), Duration::ZERO);
        assert_eq!(apply_jitter(base, 0.5, 7.0), Duration::from_millis(150));
        assert_eq!(apply_jitter(base, f64::NAN, 1.0), base);
        assert_eq!(apply_jitter(base, 0.5, f64::NAN), base);
    }

    #[test]
    fn test_negative_factor_never_goes_below_zero() {
        let policy = policy(BackoffStrategy::Exponential).with_backoff_factor(-2.0);
        assert_eq!(calculate_backoff(&policy, 1), Duration::ZERO);
    }

    #[test]
    fn test_custom_receives_attempt_index() {
        let policy = policy(BackoffStrategy::Fixed)
            .with_custom_backoff(|attempt| Duration::from_millis(u64::from(attempt) * 7));

        assert_eq!(calculate_backoff(&policy, 0), Duration::ZERO);
        assert_eq!(calculate_backoff(&policy, 3), Duration::from_millis(21));
    }

    #[test]
    fn test_custom_is_neither_capped_nor_jittered() {
        let policy = policy(BackoffStrategy::Fixed)
            .with_jitter(1.0)
            .with_custom_backoff(|_| Duration::from_secs(30));

        assert_eq!(calculate_backoff(&policy, 0), Duration::from_secs(30));
    }
}
