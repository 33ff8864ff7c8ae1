//! Tests for [`ConcurrentBatchExecutor`] — fan-out, failure isolation, merge.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ferryman::{
    AdaptiveRateLimiter, Batch, BatchWorker, CircuitBreaker, CircuitBreakerConfig,
    ConcurrentBatchExecutor, DeadlineRunner, FerrymanError, RateLimiterConfig, RequestStats,
    ResponseCache, RetryConfig, RetryPolicy, WorkerFn,
    cache::CacheConfig,
};

fn executor(stats: Arc<RequestStats>) -> ConcurrentBatchExecutor {
    ConcurrentBatchExecutor::new(
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        Arc::new(AdaptiveRateLimiter::new(RateLimiterConfig::default())),
        RetryPolicy::new(
            RetryConfig::new()
                .base_delay(Duration::from_millis(1))
                .rate_limit_cooldown(Duration::from_millis(1)),
            Arc::clone(&stats),
        ),
        Arc::new(ResponseCache::in_memory(&CacheConfig::default())),
        DeadlineRunner::new(Duration::from_secs(30)),
        stats,
        3,
    )
}

fn batch(offset: usize, names: &[&str]) -> Batch {
    Batch::new(offset, names.iter().map(|s| s.to_string()).collect(), 0, 3)
}

fn upper_worker() -> Arc<dyn BatchWorker<String>> {
    Arc::new(WorkerFn::new("upper", |items: Vec<String>| async move {
        Ok(items.iter().map(|i| i.to_uppercase()).collect())
    }))
}

#[tokio::test]
async fn merges_results_in_offset_order() {
    let executor = executor(Arc::new(RequestStats::new()));
    let batches = vec![batch(0, &["a", "b"]), batch(2, &["c", "d"]), batch(4, &["e"])];

    let results = executor.run_all(batches, upper_worker()).await;

    assert_eq!(results, vec!["A", "B", "C", "D", "E"]);
}

#[tokio::test]
async fn failed_batch_contributes_zero_results() {
    // The middle batch fails permanently; its siblings succeed and their
    // results come back in original relative order, with no error raised.
    let stats = Arc::new(RequestStats::new());
    let executor = executor(Arc::clone(&stats));
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", |items: Vec<String>| async move {
            if items.contains(&"poison".to_string()) {
                return Err(FerrymanError::Connection("refused".into()));
            }
            Ok(items.iter().map(|i| i.to_uppercase()).collect())
        }));

    let batches = vec![
        batch(0, &["a", "b"]),
        batch(2, &["poison", "c"]),
        batch(4, &["d", "e"]),
    ];
    let results = executor.run_all(batches, worker).await;

    assert_eq!(results, vec!["A", "B", "D", "E"]);
    let snap = stats.snapshot(ferryman::CircuitState::Closed, 60);
    assert_eq!(snap.failed_batches, 1);
}

#[tokio::test]
async fn merge_order_is_independent_of_completion_order() {
    // The first batch finishes last; merge must still be offset-ordered.
    let executor = executor(Arc::new(RequestStats::new()));
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", |items: Vec<String>| async move {
            if items[0] == "slow" {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Ok(items)
        }));

    let batches = vec![batch(0, &["slow", "x"]), batch(2, &["y"]), batch(3, &["z"])];
    let results = executor.run_all(batches, worker).await;

    assert_eq!(results, vec!["slow", "x", "y", "z"]);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let stats = Arc::new(RequestStats::new());
    let executor = executor(Arc::clone(&stats));
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_worker = Arc::clone(&calls);
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", move |items: Vec<String>| {
            let calls = Arc::clone(&calls_in_worker);
            async move {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok(items)
            }
        }));

    let first = executor
        .run_all(vec![batch(0, &["a", "b"])], Arc::clone(&worker))
        .await;
    let second = executor
        .run_all(vec![batch(0, &["b", "a"])], worker) // permuted: still a hit
        .await;

    assert_eq!(first, vec!["a", "b"]);
    assert_eq!(second, vec!["a", "b"]);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    let snap = stats.snapshot(ferryman::CircuitState::Closed, 60);
    assert_eq!(snap.cache_hits, 1);
    assert!(snap.estimated_cost_saved > 0);
}

#[tokio::test]
async fn cached_permutation_returns_stored_order() {
    // Order-independent lookup means a permuted batch gets the stored
    // payload verbatim; exact-replay consumers use the fingerprint.
    let executor = executor(Arc::new(RequestStats::new()));
    let worker = upper_worker();

    executor
        .run_all(vec![batch(0, &["a", "b"])], Arc::clone(&worker))
        .await;
    let permuted = executor.run_all(vec![batch(0, &["b", "a"])], worker).await;

    assert_eq!(permuted, vec!["A", "B"]);
}

#[tokio::test]
async fn worker_length_mismatch_fails_the_batch() {
    let stats = Arc::new(RequestStats::new());
    let executor = executor(Arc::clone(&stats));
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", |_items: Vec<String>| async move {
            Ok(vec!["only one".to_string()])
        }));

    let results = executor.run_all(vec![batch(0, &["a", "b", "c"])], worker).await;

    assert!(results.is_empty());
    let snap = stats.snapshot(ferryman::CircuitState::Closed, 60);
    assert_eq!(snap.failed_batches, 1);
}

#[tokio::test]
async fn transient_failures_are_retried_per_batch_budget() {
    let executor = executor(Arc::new(RequestStats::new()));
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_worker = Arc::clone(&calls);
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", move |items: Vec<String>| {
            let calls = Arc::clone(&calls_in_worker);
            async move {
                if calls.fetch_add(1, Ordering::Relaxed) < 2 {
                    return Err(FerrymanError::Connection("refused".into()));
                }
                Ok(items)
            }
        }));

    let results = executor.run_all(vec![batch(0, &["a"])], worker).await;

    assert_eq!(results, vec!["a"]);
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn deadline_overrun_times_out_the_attempt() {
    let stats = Arc::new(RequestStats::new());
    let executor = ConcurrentBatchExecutor::new(
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        Arc::new(AdaptiveRateLimiter::new(RateLimiterConfig::default())),
        RetryPolicy::new(
            RetryConfig::new().base_delay(Duration::from_millis(1)),
            Arc::clone(&stats),
        ),
        Arc::new(ResponseCache::in_memory(&CacheConfig::default())),
        DeadlineRunner::new(Duration::from_millis(20)),
        Arc::clone(&stats),
        3,
    );
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", |items: Vec<String>| async move {
            tokio::time::sleep(Duration::from_secs(300)).await;
            Ok(items)
        }));

    let results = executor
        .run_all(vec![Batch::new(0, vec!["a".into()], 0, 2)], worker)
        .await;

    assert!(results.is_empty());
    let snap = stats.snapshot(ferryman::CircuitState::Closed, 60);
    assert_eq!(snap.timeout_errors, 2); // one per attempt in the budget
    assert_eq!(snap.failed_batches, 1);
}

#[tokio::test]
async fn open_circuit_fails_remaining_batches_fast() {
    // Threshold 1: the first batch's failure opens the circuit, and with
    // concurrency 1 the following batches are rejected without a call.
    let stats = Arc::new(RequestStats::new());
    let executor = ConcurrentBatchExecutor::new(
        Arc::new(CircuitBreaker::new(
            CircuitBreakerConfig::new().failure_threshold(1),
        )),
        Arc::new(AdaptiveRateLimiter::new(RateLimiterConfig::default())),
        RetryPolicy::new(RetryConfig::disabled(), Arc::clone(&stats)),
        Arc::new(ResponseCache::in_memory(&CacheConfig::default())),
        DeadlineRunner::new(Duration::from_secs(30)),
        Arc::clone(&stats),
        1,
    );
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_worker = Arc::clone(&calls);
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", move |_items: Vec<String>| {
            let calls = Arc::clone(&calls_in_worker);
            async move {
                calls.fetch_add(1, Ordering::Relaxed);
                Err(FerrymanError::Connection("refused".into()))
            }
        }));

    let results = executor
        .run_all(
            vec![
                Batch::new(0, vec!["a".into()], 0, 1),
                Batch::new(1, vec!["b".into()], 0, 1),
                Batch::new(2, vec!["c".into()], 0, 1),
            ],
            worker,
        )
        .await;

    assert!(results.is_empty());
    assert_eq!(calls.load(Ordering::Relaxed), 1); // later batches never reach the worker
}

#[tokio::test]
async fn higher_priority_batches_dispatch_first() {
    let executor = ConcurrentBatchExecutor::new(
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        Arc::new(AdaptiveRateLimiter::new(RateLimiterConfig::default())),
        RetryPolicy::new(RetryConfig::disabled(), Arc::new(RequestStats::new())),
        Arc::new(ResponseCache::in_memory(&CacheConfig::default())),
        DeadlineRunner::new(Duration::from_secs(30)),
        Arc::new(RequestStats::new()),
        1, // serial, so dispatch order is observable
    );
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let order_in_worker = Arc::clone(&order);
    let worker: Arc<dyn BatchWorker<String>> =
        Arc::new(WorkerFn::new("upper", move |items: Vec<String>| {
            let order = Arc::clone(&order_in_worker);
            async move {
                order.lock().unwrap().push(items[0].clone());
                Ok(items)
            }
        }));

    let results = executor
        .run_all(
            vec![
                Batch::new(0, vec!["low".into()], 0, 1),
                Batch::new(1, vec!["high".into()], 5, 1),
            ],
            worker,
        )
        .await;

    // Dispatch honoured priority; merge restored offset order.
    assert_eq!(*order.lock().unwrap(), vec!["high", "low"]);
    assert_eq!(results, vec!["low", "high"]);
}
