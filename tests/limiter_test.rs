//! Tests for [`AdaptiveRateLimiter`] — window blocking and ceiling adaptation.

use std::time::Duration;

use ferryman::{AdaptiveRateLimiter, RateLimiterConfig};

fn limiter(base: u32) -> AdaptiveRateLimiter {
    AdaptiveRateLimiter::new(RateLimiterConfig::new().base_limit(base))
}

#[tokio::test]
async fn admits_immediately_under_limit() {
    let l = limiter(5);
    for _ in 0..5 {
        assert_eq!(l.admit().await, Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn blocks_until_oldest_timestamp_ages_out() {
    let l = limiter(3);
    for _ in 0..3 {
        l.admit().await;
    }

    // The window is full; the fourth call must wait for the first
    // admission to leave the trailing 60s window.
    let waited = l.admit().await;
    assert!(waited >= Duration::from_secs(59), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(62), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn admission_is_again_immediate_once_window_frees() {
    let l = limiter(2);
    l.admit().await;
    l.admit().await;

    tokio::time::sleep(Duration::from_secs(61)).await;

    // Both earlier admissions have aged out; no waiting should be reported.
    assert_eq!(l.admit().await, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn slot_frees_after_partial_window_elapses() {
    let l = limiter(2);
    l.admit().await;
    tokio::time::sleep(Duration::from_secs(40)).await;
    l.admit().await;

    // First admission ages out 20s from now; the blocked call should wait
    // roughly that long, not a full window.
    let waited = l.admit().await;
    assert!(waited >= Duration::from_secs(19), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(25), "waited {waited:?}");
}

#[tokio::test]
async fn three_consecutive_errors_shrink_ceiling() {
    let l = limiter(60);
    assert_eq!(l.current_limit(), 60.0);

    l.record_error();
    l.record_error();
    assert_eq!(l.current_limit(), 60.0); // below threshold, unchanged
    l.record_error();
    assert!((l.current_limit() - 42.0).abs() < 1e-9); // 60 * 0.7
}

#[tokio::test]
async fn error_counter_resets_after_backoff() {
    let l = limiter(60);
    for _ in 0..3 {
        l.record_error();
    }
    let after_backoff = l.current_limit();
    assert!((after_backoff - 42.0).abs() < 1e-9);

    // Two more errors are a fresh run, not a continuation.
    l.record_error();
    l.record_error();
    assert_eq!(l.current_limit(), after_backoff);
}

#[tokio::test]
async fn success_resets_consecutive_error_run() {
    let l = limiter(60);
    l.record_error();
    l.record_error();
    l.record_success(Duration::from_secs(5)); // slow success: no growth either
    l.record_error();
    l.record_error();
    l.record_error();
    assert!((l.current_limit() - 42.0).abs() < 1e-9); // only one backoff applied
}

#[tokio::test]
async fn ceiling_never_shrinks_below_min_limit() {
    let l = limiter(20); // min_limit = 2
    for _ in 0..300 {
        l.record_error();
    }
    assert_eq!(l.current_limit(), 2.0);
}

#[tokio::test]
async fn fast_success_grows_ceiling_toward_max() {
    let l = limiter(60);
    l.record_success(Duration::from_millis(500));
    assert!((l.current_limit() - 66.0).abs() < 1e-9); // 60 * 1.1

    for _ in 0..200 {
        l.record_success(Duration::from_millis(500));
    }
    assert_eq!(l.current_limit(), 120.0); // capped at base * 2
}

#[tokio::test]
async fn slow_success_does_not_grow_ceiling() {
    let l = limiter(60);
    l.record_success(Duration::from_secs(3));
    assert_eq!(l.current_limit(), 60.0);
}

#[tokio::test(start_paused = true)]
async fn shrunk_ceiling_applies_to_admission() {
    let l = limiter(20);
    for _ in 0..3 {
        l.record_error();
    }
    let reduced = l.current_limit().floor() as usize;
    assert!(reduced < 20);

    for _ in 0..reduced {
        assert_eq!(l.admit().await, Duration::ZERO);
    }
    // The next call blocks under the reduced ceiling.
    let waited = l.admit().await;
    assert!(waited >= Duration::from_secs(59));
}
