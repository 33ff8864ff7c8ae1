//! Orchestrator facade: the single entry point callers use.
//!
//! [`Ferryman`] wires the batch sizer to the concurrent executor and
//! flattens the merged results. Components are constructed per instance
//! and dependency-injected — one `Ferryman` per logical remote endpoint,
//! no process-global singletons.

mod builder;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::breaker::CircuitBreaker;
use crate::cache::ResponseCache;
use crate::executor::ConcurrentBatchExecutor;
use crate::limiter::AdaptiveRateLimiter;
use crate::sizer::BatchSizer;
use crate::stats::{RequestStats, StatsSnapshot};
use crate::worker::BatchWorker;
use crate::Result;

pub use builder::FerrymanBuilder;

/// Resilient batch-call orchestrator for one remote endpoint.
///
/// See the crate-level docs for the full data flow. Construct via
/// [`Ferryman::builder`].
pub struct Ferryman {
    sizer: BatchSizer,
    executor: ConcurrentBatchExecutor,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<AdaptiveRateLimiter>,
    cache: Arc<ResponseCache>,
    stats: Arc<RequestStats>,
}

impl Ferryman {
    /// Create a new builder with default policies.
    pub fn builder() -> FerrymanBuilder {
        FerrymanBuilder::new()
    }

    /// Process `items` through `worker`, returning one result per item in
    /// input order.
    ///
    /// Items are split into sub-batches and fanned out concurrently; each
    /// sub-batch passes through the cache, rate limiter, circuit breaker,
    /// deadline, and retry policy. Batches that fail permanently contribute
    /// zero results — the output may be shorter than the input, and
    /// [`stats`](Self::stats) reports how many batches failed and why. No
    /// error is raised for individual batch failures.
    #[instrument(skip_all, fields(operation = worker.operation(), items = items.len()))]
    pub async fn process<R>(&self, items: &[String], worker: Arc<dyn BatchWorker<R>>) -> Vec<R>
    where
        R: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Vec::new();
        }
        let batches = self.sizer.split(items);
        debug!(batches = batches.len(), "split items into sub-batches");
        self.executor.run_all(batches, worker).await
    }

    /// Point-in-time statistics: request counters, success rate, circuit
    /// state, current rate ceiling, cache savings. Safe to poll while
    /// `process` calls are running.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(
            self.breaker.state(),
            self.limiter.current_limit().floor() as u32,
        )
    }

    /// Physically remove expired cache rows, returning the count removed.
    pub async fn sweep_cache(&self) -> Result<usize> {
        self.cache.sweep().await
    }

    /// Remove all cache rows.
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await
    }
}
