//! Integration tests for circuit breaker state transitions

use brixsport_resilience::resilience::CircuitBreakerConfig;
use brixsport_resilience::{CircuitBreaker, CircuitBreakerError, CircuitState, ManualClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn breaker(clock: &Arc<ManualClock>) -> CircuitBreaker {
    CircuitBreaker::with_clock(
        "scores_api".to_string(),
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
            volume_threshold: 5,
        },
        clock.clone(),
    )
}

async fn fail(breaker: &CircuitBreaker) {
    let _ = breaker.call(|| async { Err::<(), _>("timeout") }).await;
}

async fn succeed(breaker: &CircuitBreaker) {
    let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
}

#[tokio::test]
async fn test_trips_only_after_volume_threshold() {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = breaker(&clock);

    // Three failures but only three requests: below the volume threshold
    for _ in 0..3 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.state(), CircuitState::Closed);

    succeed(&breaker).await;
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_failures_outside_window_do_not_count() {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = breaker(&clock);

    for _ in 0..5 {
        succeed(&breaker).await;
    }
    fail(&breaker).await;
    fail(&breaker).await;
    clock.advance(Duration::from_secs(61));
    fail(&breaker).await;

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().recent_failures, 1);
}

#[tokio::test]
async fn test_half_open_probe_happens_before_operation_runs() {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = Arc::new(breaker(&clock));
    for _ in 0..5 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.call(|| async { Ok::<_, &str>(()) }).await;
    assert!(matches!(rejected, Err(CircuitBreakerError::CircuitOpen { .. })));

    clock.advance(Duration::from_secs(30));
    let observed_half_open = Arc::new(AtomicBool::new(false));
    let probe = {
        let breaker = Arc::clone(&breaker);
        let observed = Arc::clone(&observed_half_open);
        move || async move {
            observed.store(breaker.state() == CircuitState::HalfOpen, Ordering::SeqCst);
            Ok::<_, &str>(())
        }
    };
    assert_ok!(breaker.call(probe).await);
    assert!(observed_half_open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_half_open_closes_after_success_threshold() {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = breaker(&clock);
    for _ in 0..5 {
        fail(&breaker).await;
    }
    clock.advance(Duration::from_secs(30));

    succeed(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    succeed(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().recent_failures, 0);
}

#[tokio::test]
async fn test_single_half_open_failure_reopens() {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = breaker(&clock);
    for _ in 0..5 {
        fail(&breaker).await;
    }
    clock.advance(Duration::from_secs(30));

    succeed(&breaker).await;
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.would_admit());
}

#[tokio::test]
async fn test_fallback_answers_rejections_and_failures() {
    let clock = Arc::new(ManualClock::new(0));
    let breaker = breaker(&clock);

    let value = breaker
        .call_with_fallback(
            || async { Err::<&str, _>("boom") },
            |_| async { "cached" },
        )
        .await;
    assert_eq!(value, "cached");

    breaker.force_open();
    let value = breaker
        .call_with_fallback(
            || async { Ok::<_, &str>("live") },
            |err| async move {
                assert!(err.is_circuit_open());
                "cached"
            },
        )
        .await;
    assert_eq!(value, "cached");

    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().total_requests, 0);
}
