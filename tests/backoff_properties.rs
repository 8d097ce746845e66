//! Property-based tests for backoff calculation and the circuit breaker

use eddy::{apply_jitter, calculate_backoff, BackoffStrategy, CircuitBreaker, RetryPolicy};
use proptest::prelude::*;
use std::time::Duration;

fn policy(strategy: BackoffStrategy, initial_ms: u64, max_ms: u64) -> RetryPolicy<()> {
    RetryPolicy::new()
        .with_strategy(strategy)
        .with_initial_backoff(Duration::from_millis(initial_ms))
        .with_max_backoff(Duration::from_millis(max_ms))
}

proptest! {
    #[test]
    fn prop_fixed_is_constant(
        initial_ms in 0u64..10_000,
        max_ms in 0u64..10_000,
        a in any::<u32>(),
        b in any::<u32>()
    ) {
        let policy = policy(BackoffStrategy::Fixed, initial_ms, max_ms);

        prop_assert_eq!(calculate_backoff(&policy, a), calculate_backoff(&policy, b));
        prop_assert_eq!(calculate_backoff(&policy, a), Duration::from_millis(initial_ms));
    }

    #[test]
    fn prop_linear_is_capped_multiple(
        initial_ms in 0u64..10_000,
        max_ms in 0u64..100_000,
        attempt in 0u32..10_000
    ) {
        let policy = policy(BackoffStrategy::Linear, initial_ms, max_ms);
        let delay = calculate_backoff(&policy, attempt);
        let expected = Duration::from_millis(initial_ms * (u64::from(attempt) + 1))
            .min(Duration::from_millis(max_ms));

        prop_assert!(delay <= Duration::from_millis(max_ms));
        prop_assert_eq!(delay, expected);
    }

    #[test]
    fn prop_exponential_within_jitter_band(
        initial_ms in 1u64..1_000,
        max_ms in 1u64..60_000,
        factor in 1.0f64..4.0,
        jitter in 0.0f64..=1.0,
        attempt in 0u32..64
    ) {
        let policy = policy(BackoffStrategy::Exponential, initial_ms, max_ms)
            .with_backoff_factor(factor)
            .with_jitter(jitter);

        let uncapped = initial_ms as f64 * 1_000_000.0 * factor.powi(attempt as i32);
        let capped = uncapped.min(max_ms as f64 * 1_000_000.0);
        let delay = calculate_backoff(&policy, attempt).as_nanos() as f64;

        // two nanoseconds of slack for rounding
        prop_assert!(delay >= capped * (1.0 - jitter) - 2.0, "{} < band for {}", delay, capped);
        prop_assert!(delay <= capped * (1.0 + jitter) + 2.0, "{} > band for {}", delay, capped);
    }

    #[test]
    fn prop_jitter_at_most_doubles(
        base_ms in 0u64..1_000_000,
        fraction in -2.0f64..2.0,
        sample in -2.0f64..2.0
    ) {
        let base = Duration::from_millis(base_ms);
        let jittered = apply_jitter(base, fraction, sample);

        prop_assert!(jittered <= base * 2);
    }

    #[test]
    fn prop_breaker_opens_after_threshold_failures(
        threshold in 1u32..50,
        success_reset in 1u32..10
    ) {
        let mut breaker = CircuitBreaker::new(threshold, success_reset);

        for _ in 0..threshold - 1 {
            breaker.record_failure();
            prop_assert!(breaker.should_retry());
        }
        breaker.record_failure();
        prop_assert!(!breaker.should_retry());

        for _ in 0..success_reset {
            breaker.record_success();
        }
        prop_assert_eq!(breaker.failures(), 0);
        prop_assert!(breaker.should_retry());
    }

    #[test]
    fn prop_breaker_stays_open_short_of_reset(
        threshold in 1u32..50,
        success_reset in 2u32..10
    ) {
        let mut breaker = CircuitBreaker::new(threshold, success_reset);
        for _ in 0..threshold {
            breaker.record_failure();
        }

        for _ in 0..success_reset - 1 {
            breaker.record_success();
        }
        prop_assert!(!breaker.should_retry());
        prop_assert_eq!(breaker.failures(), threshold);
    }
}
