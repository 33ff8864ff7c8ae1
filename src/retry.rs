//! Retry configuration and error-class-aware retry execution.
//!
//! [`RetryPolicy`] drives attempts through two independent budgets:
//!
//! - **Rate-limit budget** — `RateLimited` failures sleep a fixed cooldown
//!   (or the provider's `retry_after` hint) and retry up to
//!   `rate_limit_max_retries` times without consuming general attempts.
//!   A rate-limited endpoint is not failing, it is asking us to wait.
//! - **General budget** — `Timeout`, `Connection`, and other transient
//!   failures back off exponentially (`base_delay * backoff_factor^n`,
//!   capped at `max_delay`) and retry up to `max_attempts`.
//!
//! `CircuitOpen` and non-transient errors return immediately. Exhausting
//! either budget yields the terminal [`FerrymanError::ProcessingFailed`]
//! carrying the last underlying cause.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::ErrorKind;
use crate::stats::RequestStats;
use crate::telemetry;
use crate::{FerrymanError, Result};

/// Configuration for retry behaviour.
///
/// ```rust
/// # use ferryman::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(3)
///     .base_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum general attempts (including the initial request).
    /// 1 = no retry. Default: 5.
    pub max_attempts: u32,
    /// Base delay before the first backoff retry. Default: 1s.
    pub base_delay: Duration,
    /// Multiplier applied per backoff step. Default: 2.0.
    pub backoff_factor: f64,
    /// Cap on the backoff delay. Default: 60s.
    pub max_delay: Duration,
    /// Fixed wait after a rate-limit response with no hint. Default: 60s.
    pub rate_limit_cooldown: Duration,
    /// Rate-limit retries, budgeted separately from `max_attempts`.
    /// Default: 3.
    pub rate_limit_max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            rate_limit_cooldown: Duration::from_secs(60),
            rate_limit_max_retries: 3,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            rate_limit_max_retries: 0,
            ..Self::default()
        }
    }

    /// Set maximum general attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base backoff delay.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the per-step backoff multiplier.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the maximum backoff delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the fixed rate-limit cooldown.
    pub fn rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    /// Set the separate rate-limit retry budget.
    pub fn rate_limit_max_retries(mut self, n: u32) -> Self {
        self.rate_limit_max_retries = n;
        self
    }

    /// Backoff delay for a given retry step (0-indexed).
    ///
    /// `base_delay * backoff_factor^step`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, step: u32) -> Duration {
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(step as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Executes operations under the configured retry budgets, recording every
/// attempt in the shared [`RequestStats`].
pub struct RetryPolicy {
    config: RetryConfig,
    stats: Arc<RequestStats>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, stats: Arc<RequestStats>) -> Self {
        Self { config, stats }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `f` until it succeeds or a retry budget is exhausted.
    ///
    /// `max_attempts` overrides the config's general budget so callers can
    /// carry a per-batch budget. Rate-limit retries use their own budget
    /// and honour `retry_after` hints over the fixed cooldown.
    pub async fn execute<F, Fut, T>(&self, operation: &str, max_attempts: u32, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut backoff_failures = 0u32;
        let mut rate_limit_retries = 0u32;
        let mut total_attempts = 0u32;

        loop {
            total_attempts += 1;
            self.stats.record_attempt();

            let attempt_start = Instant::now();
            let err = match f().await {
                Ok(value) => {
                    self.stats.record_success(attempt_start.elapsed());
                    return Ok(value);
                }
                Err(e) => e,
            };
            self.stats.record_failure(err.kind());

            match err.kind() {
                ErrorKind::CircuitOpen => return Err(err),
                ErrorKind::RateLimited => {
                    if rate_limit_retries >= self.config.rate_limit_max_retries {
                        return Err(Self::terminal(total_attempts, err));
                    }
                    rate_limit_retries += 1;
                    let delay = err.retry_after().unwrap_or(self.config.rate_limit_cooldown);
                    self.note_retry(operation, &err, rate_limit_retries, delay);
                    tokio::time::sleep(delay).await;
                }
                _ if err.is_transient() => {
                    backoff_failures += 1;
                    if backoff_failures >= max_attempts {
                        return Err(Self::terminal(total_attempts, err));
                    }
                    let delay = self.config.delay_for_attempt(backoff_failures - 1);
                    self.note_retry(operation, &err, backoff_failures, delay);
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(err), // non-retryable
            }
        }
    }

    fn terminal(attempts: u32, last: FerrymanError) -> FerrymanError {
        FerrymanError::ProcessingFailed {
            attempts,
            source: Box::new(last),
        }
    }

    fn note_retry(&self, operation: &str, err: &FerrymanError, attempt: u32, delay: Duration) {
        metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
            .increment(1);
        warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );
    }
}
