//! Ferryman - resilient batch-call orchestration for remote AI services
//!
//! This crate sits between a batch text-analysis pipeline and an
//! unreliable, rate-limited, pay-per-call completion service. Callers hand
//! over a list of text items and a "perform one remote call for this batch"
//! worker; ferryman handles batching, caching, admission control, failure
//! isolation, and retries, and returns a flat result list in input order.
//!
//! # Data flow
//!
//! ```text
//! process(items, worker)
//!     │
//!     ▼
//! BatchSizer ── splits items into cost/size-bounded batches
//!     │
//!     ▼
//! ConcurrentBatchExecutor ── bounded fan-out, per batch:
//!     │
//!     ├─ ResponseCache lookup ── hit: done, remote call skipped
//!     └─ miss: RetryPolicy(
//!            AdaptiveRateLimiter.admit
//!            → CircuitBreaker.guard(DeadlineRunner.run(worker))
//!        ) → ResponseCache store
//!     │
//!     ▼
//! merge by batch offset ── original item order, failed batches omitted
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ferryman::{BatchWorker, Ferryman, WorkerFn};
//!
//! #[tokio::main]
//! async fn main() -> ferryman::Result<()> {
//!     let ferryman = Ferryman::builder().build()?;
//!
//!     // The worker owns the actual remote call (HTTP client, prompt
//!     // assembly, response parsing) and returns one record per item.
//!     let worker: Arc<dyn BatchWorker<String>> =
//!         Arc::new(WorkerFn::new("sentiment", |items: Vec<String>| async move {
//!             // ... call the completion API for the whole batch ...
//!             Ok(items.iter().map(|_| "positive".to_string()).collect())
//!         }));
//!
//!     let items = vec!["great product".to_string(), "never again".to_string()];
//!     let results = ferryman.process(&items, worker).await;
//!
//!     println!("{} results, stats: {:?}", results.len(), ferryman.stats());
//!     Ok(())
//! }
//! ```
//!
//! # Failure isolation
//!
//! A batch whose retries are exhausted is dropped, not fatal: `process`
//! returns the results of every batch that succeeded, and
//! [`Ferryman::stats`] reports the failure counts. The only errors raised
//! to callers are construction-time configuration errors.
//!
//! # Deadlines are caller-side only
//!
//! [`DeadlineRunner`] bounds how long ferryman *waits*, not how long the
//! remote call runs: a timed-out call is detached, and the underlying
//! request may complete (and bill) in the background. See the module docs
//! for the rationale.

pub mod breaker;
pub mod cache;
pub mod deadline;
pub mod error;
pub mod executor;
pub mod limiter;
pub mod orchestrator;
pub mod retry;
pub mod sizer;
pub mod stats;
pub mod telemetry;
pub mod worker;

// Re-export main types at crate root
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use cache::{CacheConfig, CacheEntry, CacheStore, FileStore, MemoryStore, ResponseCache};
pub use deadline::DeadlineRunner;
pub use error::{ErrorKind, FerrymanError, Result};
pub use executor::ConcurrentBatchExecutor;
pub use limiter::{AdaptiveRateLimiter, RateLimiterConfig};
pub use orchestrator::{Ferryman, FerrymanBuilder};
pub use retry::{RetryConfig, RetryPolicy};
pub use sizer::{Batch, BatchSizer, BatchSizerConfig};
pub use stats::{RequestStats, StatsSnapshot};
pub use worker::{BatchWorker, WorkerFn};
