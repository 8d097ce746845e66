//! Custom Backoff Example
//!
//! Compares the delay schedules of every backoff strategy and retries an
//! operation under a caller-supplied delay function.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eddy::{run_with_hooks, BackoffStrategy, RetryEvent, RetryPolicy, TransientError};
use tokio_util::sync::CancellationToken;

/// Example 1: delay schedules side by side
fn example_schedules() {
    println!("\n=== Example 1: Backoff Schedules ===");

    let strategies = [
        ("fixed", BackoffStrategy::Fixed),
        ("linear", BackoffStrategy::Linear),
        ("exponential", BackoffStrategy::Exponential),
    ];

    for (name, strategy) in strategies {
        let policy: RetryPolicy<()> = RetryPolicy::new()
            .with_strategy(strategy)
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_secs(1))
            .with_jitter(0.1);
        let delays: Vec<_> = (0..6).map(|i| policy.delay_for_attempt(i)).collect();
        println!("{:>12}: {:?}", name, delays);
    }
}

/// Example 2: a caller-supplied delay function
async fn example_custom() {
    println!("\n=== Example 2: Custom Delay Function ===");

    let policy = RetryPolicy::custom(|attempt| Duration::from_millis(u64::from(attempt) * 200))
        .with_max_retries(5);
    let calls = AtomicU32::new(0);

    let outcome = run_with_hooks(
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n % 3 != 2 {
                    Err(TransientError::Temporary)
                } else {
                    Ok(n + 1)
                }
            }
        },
        &policy,
        &CancellationToken::new(),
        |event: &RetryEvent<'_, TransientError>| {
            println!(
                "  attempt {}/{} failed: {}, next delay: {:?}",
                event.attempt, event.max_retries, event.error, event.next_delay
            );
        },
    )
    .await;

    match outcome.into_result() {
        Ok(n) => println!("Operation succeeded on attempt {}", n),
        Err(e) => println!("Operation failed: {}", e),
    }
}

#[tokio::main]
async fn main() {
    println!("Eddy - Custom Backoff");
    println!("=====================");

    example_schedules();
    example_custom().await;

    println!("\n=== All examples completed! ===");
}
