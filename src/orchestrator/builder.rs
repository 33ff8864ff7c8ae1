//! Builder for configuring orchestrator instances.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::cache::{CacheConfig, CacheStore, ResponseCache};
use crate::deadline::{DEFAULT_DEADLINE, DeadlineRunner};
use crate::executor::{ConcurrentBatchExecutor, DEFAULT_MAX_CONCURRENCY};
use crate::limiter::{AdaptiveRateLimiter, RateLimiterConfig};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::sizer::{BatchSizer, BatchSizerConfig};
use crate::stats::RequestStats;
use crate::{FerrymanError, Result};

use super::Ferryman;

/// Builder for [`Ferryman`] instances.
///
/// Every policy knob has a default matching the component configs; override
/// only what the endpoint needs. `build()` validates the combination and
/// returns [`FerrymanError::Configuration`] for bounds that cannot work —
/// configuration mistakes fail at construction, never mid-pipeline.
pub struct FerrymanBuilder {
    retry: RetryConfig,
    breaker: CircuitBreakerConfig,
    limiter: RateLimiterConfig,
    sizer: BatchSizerConfig,
    cache: CacheConfig,
    cache_store: Option<Arc<dyn CacheStore>>,
    deadline: Duration,
    max_concurrency: usize,
}

impl Default for FerrymanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FerrymanBuilder {
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            limiter: RateLimiterConfig::default(),
            sizer: BatchSizerConfig::default(),
            cache: CacheConfig::default(),
            cache_store: None,
            deadline: DEFAULT_DEADLINE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Set the retry policy configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Set the circuit breaker configuration.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    /// Set the adaptive rate limiter configuration.
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.limiter = config;
        self
    }

    /// Set the batch sizing configuration.
    pub fn batch_sizer(mut self, config: BatchSizerConfig) -> Self {
        self.sizer = config;
        self
    }

    /// Set the cache TTL and capacity configuration.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Use a custom cache backend (e.g. [`FileStore`](crate::cache::FileStore)
    /// for restart survival). Defaults to the in-memory backend.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Set the per-call wall-clock deadline. Default: 120s.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the maximum number of batches in flight at once. Default: 3.
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// Validate the configuration and build the orchestrator.
    pub fn build(self) -> Result<Ferryman> {
        self.sizer.validate()?;
        if self.max_concurrency == 0 {
            return Err(FerrymanError::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.deadline.is_zero() {
            return Err(FerrymanError::Configuration(
                "deadline must be non-zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(FerrymanError::Configuration(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.limiter.base_limit == 0 {
            return Err(FerrymanError::Configuration(
                "base_limit must be at least 1".into(),
            ));
        }

        let stats = Arc::new(RequestStats::new());
        let breaker = Arc::new(CircuitBreaker::new(self.breaker));
        let limiter = Arc::new(AdaptiveRateLimiter::new(self.limiter));
        let cache = Arc::new(match self.cache_store {
            Some(store) => ResponseCache::with_store(store, &self.cache),
            None => ResponseCache::in_memory(&self.cache),
        });
        let executor = ConcurrentBatchExecutor::new(
            Arc::clone(&breaker),
            Arc::clone(&limiter),
            RetryPolicy::new(self.retry, Arc::clone(&stats)),
            Arc::clone(&cache),
            DeadlineRunner::new(self.deadline),
            Arc::clone(&stats),
            self.max_concurrency,
        );
        Ok(Ferryman {
            sizer: BatchSizer::new(self.sizer),
            executor,
            breaker,
            limiter,
            cache,
            stats,
        })
    }
}
