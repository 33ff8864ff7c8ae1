//! Adaptive sliding-window admission control.
//!
//! [`AdaptiveRateLimiter`] keeps the timestamps of calls admitted within
//! the trailing window (default 60s). [`admit`] blocks until the window has
//! room under the current ceiling — admission is delayed, never dropped.
//!
//! The ceiling adapts to what the endpoint can sustain: fast successes grow
//! it by `recovery_factor` toward `max_limit`; a run of consecutive errors
//! shrinks it by `backoff_factor` toward `min_limit`. One limiter instance
//! is shared by all workers hitting one logical endpoint; state lives
//! behind a single mutex, never held across a sleep.
//!
//! [`admit`]: AdaptiveRateLimiter::admit

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;

/// Configuration for adaptive rate limiting.
///
/// ```rust
/// # use ferryman::RateLimiterConfig;
/// let config = RateLimiterConfig::new().base_limit(30);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Initial ceiling: calls admitted per window. Default: 60.
    pub base_limit: u32,
    /// Trailing window length. Default: 60s.
    pub window: Duration,
    /// Successes faster than this grow the ceiling. Default: 2s.
    pub fast_latency: Duration,
    /// Ceiling multiplier on fast success. Default: 1.1.
    pub recovery_factor: f64,
    /// Ceiling multiplier after an error run. Default: 0.7.
    pub backoff_factor: f64,
    /// Consecutive errors before the ceiling shrinks. Default: 3.
    pub error_threshold: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            base_limit: 60,
            window: Duration::from_secs(60),
            fast_latency: Duration::from_secs(2),
            recovery_factor: 1.1,
            backoff_factor: 0.7,
            error_threshold: 3,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial ceiling (calls per window).
    pub fn base_limit(mut self, n: u32) -> Self {
        self.base_limit = n;
        self
    }

    /// Set the trailing window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the fast-latency threshold for ceiling recovery.
    pub fn fast_latency(mut self, latency: Duration) -> Self {
        self.fast_latency = latency;
        self
    }

    /// Set the recovery multiplier.
    pub fn recovery_factor(mut self, factor: f64) -> Self {
        self.recovery_factor = factor;
        self
    }

    /// Set the backoff multiplier.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the consecutive-error threshold.
    pub fn error_threshold(mut self, n: u32) -> Self {
        self.error_threshold = n;
        self
    }

    /// Floor the ceiling can shrink to: `max(1, base_limit / 10)`.
    pub fn min_limit(&self) -> f64 {
        (self.base_limit / 10).max(1) as f64
    }

    /// Cap the ceiling can grow to: `base_limit * 2`.
    pub fn max_limit(&self) -> f64 {
        (self.base_limit as f64) * 2.0
    }
}

#[derive(Debug)]
struct LimiterInner {
    window: VecDeque<Instant>,
    current_limit: f64,
    consecutive_errors: u32,
}

/// Sliding-window rate limiter with an adaptive ceiling.
pub struct AdaptiveRateLimiter {
    config: RateLimiterConfig,
    inner: Mutex<LimiterInner>,
}

impl AdaptiveRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let current_limit = config.base_limit.max(1) as f64;
        Self {
            config,
            inner: Mutex::new(LimiterInner {
                window: VecDeque::new(),
                current_limit,
                consecutive_errors: 0,
            }),
        }
    }

    /// Current ceiling, for the stats surface.
    pub fn current_limit(&self) -> f64 {
        self.lock().current_limit
    }

    /// Block until the window admits a call, returning the time waited.
    ///
    /// Returns `Duration::ZERO` when the window has room immediately. When
    /// the window is full, sleeps until the oldest admission ages out, then
    /// re-checks (another worker may have taken the freed slot).
    pub async fn admit(&self) -> Duration {
        let start = Instant::now();
        let mut slept = false;
        loop {
            let wait = {
                let mut inner = self.lock();
                let now = Instant::now();
                let window = self.config.window;
                while inner
                    .window
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= window)
                {
                    inner.window.pop_front();
                }
                let limit = (inner.current_limit.floor() as usize).max(1);
                if inner.window.len() < limit {
                    inner.window.push_back(now);
                    // First-pass admission involved no waiting at all.
                    if !slept {
                        return Duration::ZERO;
                    }
                    let waited = start.elapsed();
                    metrics::histogram!(telemetry::RATE_LIMIT_WAIT_SECONDS)
                        .record(waited.as_secs_f64());
                    return waited;
                }
                match inner.window.front() {
                    Some(oldest) => (*oldest + window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };
            debug!(
                wait_ms = wait.as_millis() as u64,
                "rate window full; waiting for admission"
            );
            slept = true;
            tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
        }
    }

    /// Record a successful call; fast calls grow the ceiling.
    pub fn record_success(&self, latency: Duration) {
        let mut inner = self.lock();
        inner.consecutive_errors = 0;
        let max = self.config.max_limit();
        if latency < self.config.fast_latency && inner.current_limit < max {
            inner.current_limit = (inner.current_limit * self.config.recovery_factor).min(max);
            metrics::gauge!(telemetry::RATE_LIMIT_CEILING).set(inner.current_limit);
            debug!(limit = inner.current_limit, "rate ceiling raised");
        }
    }

    /// Record a failed call; a run of errors shrinks the ceiling.
    pub fn record_error(&self) {
        let mut inner = self.lock();
        inner.consecutive_errors += 1;
        if inner.consecutive_errors >= self.config.error_threshold {
            let previous = inner.current_limit;
            inner.current_limit =
                (inner.current_limit * self.config.backoff_factor).max(self.config.min_limit());
            inner.consecutive_errors = 0;
            metrics::gauge!(telemetry::RATE_LIMIT_CEILING).set(inner.current_limit);
            warn!(
                previous_limit = previous,
                limit = inner.current_limit,
                "error run detected; rate ceiling lowered"
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
