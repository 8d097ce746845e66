//! Basic Usage Example
//!
//! Retries a flaky operation with the default policy, then shows the
//! three ways a run can give up: exhausted retries, an open circuit
//! breaker, and cancellation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eddy::{run, RetryOutcome, RetryPolicy, TransientError};
use tokio_util::sync::CancellationToken;

// ==================== Flaky Operation ====================

/// Example 1: an operation that fails on even clock ticks
async fn example_flaky() {
    println!("\n=== Example 1: Flaky Operation ===");

    let policy = RetryPolicy::new()
        .with_max_retries(3)
        .with_initial_backoff(Duration::from_millis(50));

    let outcome = run(
        || async {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or(0);
            if nanos % 2 == 0 {
                println!("  attempt failed");
                Err(TransientError::Temporary)
            } else {
                Ok(())
            }
        },
        &policy,
        &CancellationToken::new(),
    )
    .await;

    match outcome.into_result() {
        Ok(()) => println!("Operation succeeded"),
        Err(e) => println!("Operation failed: {}", e),
    }
}

// ==================== Giving Up ====================

/// Example 2: each terminal outcome
async fn example_terminal_outcomes() {
    println!("\n=== Example 2: Terminal Outcomes ===");

    let always_fails = || async { Err::<(), _>(TransientError::Network) };

    let exhausted = run(
        always_fails,
        &RetryPolicy::fixed(Duration::from_millis(10)).with_max_retries(3),
        &CancellationToken::new(),
    )
    .await;
    println!("max retries 3, threshold 5:  {:?}", exhausted);

    let tripped = run(
        always_fails,
        &RetryPolicy::fixed(Duration::from_millis(10))
            .with_max_retries(5)
            .with_breaker_threshold(2),
        &CancellationToken::new(),
    )
    .await;
    println!("max retries 5, threshold 2:  {:?}", tripped);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let calls = AtomicU32::new(0);
    let cancelled = run(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            always_fails()
        },
        &RetryPolicy::fixed(Duration::from_secs(10)),
        &cancel,
    )
    .await;
    println!(
        "cancelled after 100ms:       {:?} ({} call)",
        cancelled,
        calls.load(Ordering::SeqCst)
    );

    assert!(matches!(exhausted, RetryOutcome::ExhaustedRetries(_)));
    assert_eq!(tripped, RetryOutcome::CircuitOpen { attempts: 2 });
    assert_eq!(cancelled, RetryOutcome::Cancelled { attempts: 1 });
}

#[tokio::main]
async fn main() {
    println!("Eddy - Basic Usage");
    println!("==================");

    example_flaky().await;
    example_terminal_outcomes().await;

    println!("\n=== All examples completed! ===");
}
