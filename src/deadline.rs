//! Caller-side deadline enforcement.
//!
//! [`DeadlineRunner`] dispatches an operation onto the runtime and waits up
//! to a wall-clock deadline for it to finish. If the deadline passes, the
//! caller gets [`FerrymanError::Timeout`] and stops waiting — the spawned
//! task is **detached, not cancelled**, and the underlying remote call may
//! keep running in the background until it completes on its own.
//!
//! This abandonment semantics is a deliberate design limitation: the cost
//! is one outstanding remote call per timeout event. Callers that need true
//! cancellation must implement cooperative cancellation inside the worker;
//! this layer only bounds how long the *caller* waits.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{FerrymanError, Result};

/// Default wall-clock deadline for one remote call.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Enforces a hard deadline on remote-call futures.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineRunner {
    deadline: Duration,
}

impl Default for DeadlineRunner {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl DeadlineRunner {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run `operation`, waiting at most the configured deadline.
    ///
    /// Errors raised by `operation` before the deadline propagate unchanged.
    /// A panic inside the operation surfaces as [`FerrymanError::Worker`].
    /// On deadline expiry the join handle is dropped, detaching the task.
    pub async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(operation);
        match tokio::time::timeout(self.deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(FerrymanError::Worker(format!(
                "worker task panicked: {join_err}"
            ))),
            Err(_) => {
                warn!(
                    deadline_secs = self.deadline.as_secs_f64(),
                    "deadline exceeded; detaching from in-flight call"
                );
                Err(FerrymanError::Timeout {
                    deadline: self.deadline,
                })
            }
        }
    }
}
