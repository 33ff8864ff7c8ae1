//! Shared request statistics.
//!
//! [`RequestStats`] is a process-lifetime accumulator shared by the retry
//! policy and executor for one logical endpoint. Counters are atomic and
//! monotonic; the latency list is a capped rolling window. [`snapshot`]
//! produces a serialisable read-only view that is safe to poll while
//! workers are running.
//!
//! [`snapshot`]: RequestStats::snapshot

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::breaker::CircuitState;
use crate::error::ErrorKind;

/// Number of recent latency samples retained (oldest evicted first).
const LATENCY_SAMPLES: usize = 100;

/// Monotonic counters plus a rolling latency window for one endpoint.
#[derive(Debug, Default)]
pub struct RequestStats {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    timeout_errors: AtomicU64,
    connection_errors: AtomicU64,
    rate_limit_errors: AtomicU64,
    cache_hits: AtomicU64,
    failed_batches: AtomicU64,
    cost_saved: AtomicU64,
    latencies: Mutex<VecDeque<f64>>,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an attempt was issued (success or failure not yet known).
    pub fn record_attempt(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful attempt and its observed latency.
    pub fn record_success(&self, latency: Duration) {
        self.success.fetch_add(1, Ordering::Relaxed);
        let mut latencies = self.lock_latencies();
        if latencies.len() == LATENCY_SAMPLES {
            latencies.pop_front();
        }
        latencies.push_back(latency.as_secs_f64());
    }

    /// Record a failed attempt, bucketed by error class.
    pub fn record_failure(&self, kind: ErrorKind) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        match kind {
            ErrorKind::Timeout => self.timeout_errors.fetch_add(1, Ordering::Relaxed),
            ErrorKind::Connection => self.connection_errors.fetch_add(1, Ordering::Relaxed),
            ErrorKind::RateLimited => self.rate_limit_errors.fetch_add(1, Ordering::Relaxed),
            ErrorKind::CircuitOpen | ErrorKind::Other => 0,
        };
    }

    /// Record a cache hit and the cost units it avoided spending.
    pub fn record_cache_hit(&self, cost_units: u64) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.cost_saved.fetch_add(cost_units, Ordering::Relaxed);
    }

    /// Record a batch that failed permanently after retry exhaustion.
    pub fn record_failed_batch(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean of the retained latency samples, if any.
    pub fn average_latency(&self) -> Option<f64> {
        let latencies = self.lock_latencies();
        if latencies.is_empty() {
            return None;
        }
        Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
    }

    /// Produce a point-in-time snapshot.
    ///
    /// Circuit state and rate ceiling live in their own components, so the
    /// facade passes them in rather than this struct holding references.
    pub fn snapshot(&self, circuit_state: CircuitState, current_rate_limit: u32) -> StatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let success = self.success.load(Ordering::Relaxed);
        let success_rate_percent = if total == 0 {
            0.0
        } else {
            success as f64 / total as f64 * 100.0
        };
        StatsSnapshot {
            total_requests: total,
            successful_requests: success,
            failed_requests: self.failed.load(Ordering::Relaxed),
            timeout_errors: self.timeout_errors.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            rate_limit_errors: self.rate_limit_errors.load(Ordering::Relaxed),
            success_rate_percent,
            circuit_breaker_state: circuit_state.as_str().to_owned(),
            current_rate_limit,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            estimated_cost_saved: self.cost_saved.load(Ordering::Relaxed),
            average_latency_seconds: self.average_latency(),
        }
    }

    fn lock_latencies(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        // A poisoned lock only means another thread panicked mid-push;
        // the sample window is still usable.
        self.latencies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Read-only view of [`RequestStats`] plus current component state.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub timeout_errors: u64,
    pub connection_errors: u64,
    pub rate_limit_errors: u64,
    pub success_rate_percent: f64,
    pub circuit_breaker_state: String,
    pub current_rate_limit: u32,
    pub cache_hits: u64,
    pub failed_batches: u64,
    pub estimated_cost_saved: u64,
    pub average_latency_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_zero_when_no_requests() {
        let stats = RequestStats::new();
        let snap = stats.snapshot(CircuitState::Closed, 60);
        assert_eq!(snap.success_rate_percent, 0.0);
        assert_eq!(snap.total_requests, 0);
    }

    #[test]
    fn success_rate_reflects_counters() {
        let stats = RequestStats::new();
        for _ in 0..4 {
            stats.record_attempt();
        }
        stats.record_success(Duration::from_millis(100));
        stats.record_success(Duration::from_millis(200));
        stats.record_success(Duration::from_millis(300));
        stats.record_failure(ErrorKind::Timeout);

        let snap = stats.snapshot(CircuitState::Closed, 60);
        assert_eq!(snap.total_requests, 4);
        assert_eq!(snap.successful_requests, 3);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.timeout_errors, 1);
        assert_eq!(snap.success_rate_percent, 75.0);
    }

    #[test]
    fn latency_window_is_capped() {
        let stats = RequestStats::new();
        for _ in 0..(LATENCY_SAMPLES + 50) {
            stats.record_success(Duration::from_secs(1));
        }
        stats.record_success(Duration::from_secs(3));
        // 99 one-second samples + one three-second sample
        let avg = stats.average_latency().unwrap();
        assert!(avg > 1.0 && avg < 1.1);
    }

    #[test]
    fn cost_saved_accumulates() {
        let stats = RequestStats::new();
        stats.record_cache_hit(120);
        stats.record_cache_hit(80);
        let snap = stats.snapshot(CircuitState::Closed, 60);
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.estimated_cost_saved, 200);
    }
}
