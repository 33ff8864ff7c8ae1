//! Concurrent batch execution with failure isolation.
//!
//! [`ConcurrentBatchExecutor::run_all`] fans sub-batches out to a bounded
//! pool of workers. Each batch independently runs the full protection
//! stack: cache lookup, then on a miss rate-limiter admission, circuit
//! breaker, deadline-bounded worker call, all under the retry policy, with
//! the result stored back in the cache.
//!
//! A batch that fails permanently is logged and dropped — it contributes
//! zero results and never aborts its siblings. Results are merged back into
//! the caller's original item order via each batch's offset, regardless of
//! completion order.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::cache::ResponseCache;
use crate::deadline::DeadlineRunner;
use crate::error::ErrorKind;
use crate::limiter::AdaptiveRateLimiter;
use crate::retry::RetryPolicy;
use crate::sizer::Batch;
use crate::stats::RequestStats;
use crate::telemetry;
use crate::worker::BatchWorker;
use crate::{FerrymanError, Result};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Default number of batches in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Runs batches through the protection stack with bounded parallelism.
pub struct ConcurrentBatchExecutor {
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<AdaptiveRateLimiter>,
    retry: RetryPolicy,
    cache: Arc<ResponseCache>,
    deadline: DeadlineRunner,
    stats: Arc<RequestStats>,
    max_concurrency: usize,
}

impl ConcurrentBatchExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<AdaptiveRateLimiter>,
        retry: RetryPolicy,
        cache: Arc<ResponseCache>,
        deadline: DeadlineRunner,
        stats: Arc<RequestStats>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            breaker,
            limiter,
            retry,
            cache,
            deadline,
            stats,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run every batch through the worker, merging results in the original
    /// pre-split item order.
    ///
    /// Higher-priority batches are dispatched first; merge order is always
    /// offset order. Permanently failed batches contribute zero results and
    /// raise no error here — failure counts surface through the stats.
    pub async fn run_all<R>(
        &self,
        mut batches: Vec<Batch>,
        worker: Arc<dyn BatchWorker<R>>,
    ) -> Vec<R>
    where
        R: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        batches.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.offset.cmp(&b.offset)));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let runs = batches.into_iter().map(|batch| {
            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(&worker);
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (batch.offset, None), // pool shut down
                };
                let offset = batch.offset;
                match self.run_batch(&batch, &worker).await {
                    Ok(results) => (offset, Some(results)),
                    Err(e) => {
                        warn!(
                            offset,
                            batch_len = batch.len(),
                            error = %e,
                            "batch failed permanently; continuing with siblings"
                        );
                        self.stats.record_failed_batch();
                        metrics::counter!(
                            telemetry::BATCHES_FAILED_TOTAL,
                            "operation" => worker.operation().to_owned()
                        )
                        .increment(1);
                        (offset, None)
                    }
                }
            }
        });

        let mut completed: Vec<(usize, Vec<R>)> = futures_util::future::join_all(runs)
            .await
            .into_iter()
            .filter_map(|(offset, results)| results.map(|r| (offset, r)))
            .collect();
        completed.sort_by_key(|(offset, _)| *offset);
        completed
            .into_iter()
            .flat_map(|(_, results)| results)
            .collect()
    }

    /// Run one batch: cache lookup, then the guarded remote call on a miss.
    async fn run_batch<R>(&self, batch: &Batch, worker: &Arc<dyn BatchWorker<R>>) -> Result<Vec<R>>
    where
        R: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let operation = worker.operation();
        match self.cache.get::<R>(operation, &batch.items).await {
            Ok(Some(results)) => {
                debug!(offset = batch.offset, "cache hit; skipping remote call");
                self.stats.record_cache_hit(batch.estimated_cost());
                return Ok(results);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache lookup failed; treating as miss"),
        }

        let start = Instant::now();
        let outcome = self
            .retry
            .execute(operation, batch.max_attempts, || {
                let worker = Arc::clone(worker);
                let items = batch.items.clone();
                async move {
                    let waited = self.limiter.admit().await;
                    if !waited.is_zero() {
                        debug!(
                            waited_ms = waited.as_millis() as u64,
                            "admission delayed by rate window"
                        );
                    }
                    let attempt_start = Instant::now();
                    let call = async move { worker.call(&items).await };
                    let result = self.breaker.guard(self.deadline.run(call)).await;
                    match &result {
                        Ok(_) => self.limiter.record_success(attempt_start.elapsed()),
                        // A fast-failed admission never reached the remote
                        // service, so it says nothing about its health.
                        Err(e) if e.kind() != ErrorKind::CircuitOpen => {
                            self.limiter.record_error()
                        }
                        Err(_) => {}
                    }
                    result
                }
            })
            .await;

        let duration = start.elapsed();
        let status = if outcome.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            telemetry::REQUESTS_TOTAL,
            "operation" => operation.to_owned(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!(
            telemetry::REQUEST_DURATION_SECONDS,
            "operation" => operation.to_owned()
        )
        .record(duration.as_secs_f64());

        let results = outcome?;
        if results.len() != batch.items.len() {
            return Err(FerrymanError::InvalidInput(format!(
                "worker returned {} results for {} items; workers must pad shortfalls",
                results.len(),
                batch.items.len()
            )));
        }
        if let Err(e) = self.cache.put(operation, &batch.items, &results).await {
            warn!(error = %e, "failed to store results in cache");
        }
        Ok(results)
    }
}
