//! Worker callback contract.
//!
//! The caller supplies the actual remote call; this layer only orchestrates
//! it. A worker must return exactly one result record per input item, in
//! input order — the executor rejects a mismatched length as
//! [`InvalidInput`](crate::FerrymanError::InvalidInput) rather than padding,
//! because a worker that drops items is a bug, not a transient failure.
//! Workers that tolerate partial provider responses must pad with their own
//! documented default record before returning.
//!
//! Workers translate transport failures into [`FerrymanError`] variants at
//! this boundary so the retry policy can classify them.

use std::future::Future;

use async_trait::async_trait;

use crate::Result;

/// A caller-supplied "perform one remote call for this batch" operation.
#[async_trait]
pub trait BatchWorker<R>: Send + Sync {
    /// Operation name, used as the cache namespace and metrics label
    /// (e.g. "sentiment", "themes").
    fn operation(&self) -> &str;

    /// Perform one remote call for `items`, returning one record per item,
    /// same order, same length.
    async fn call(&self, items: &[String]) -> Result<Vec<R>>;
}

/// Adapter turning an async closure into a [`BatchWorker`].
///
/// ```rust
/// # use ferryman::WorkerFn;
/// let worker = WorkerFn::new("echo", |items: Vec<String>| async move {
///     ferryman::Result::Ok(items)
/// });
/// ```
pub struct WorkerFn<F> {
    operation: String,
    f: F,
}

impl<F> WorkerFn<F> {
    pub fn new(operation: impl Into<String>, f: F) -> Self {
        Self {
            operation: operation.into(),
            f,
        }
    }
}

#[async_trait]
impl<R, F, Fut> BatchWorker<R> for WorkerFn<F>
where
    R: Send + 'static,
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<R>>> + Send,
{
    fn operation(&self) -> &str {
        &self.operation
    }

    async fn call(&self, items: &[String]) -> Result<Vec<R>> {
        (self.f)(items.to_vec()).await
    }
}
