//! Ferryman error types
//!
//! All policy code (retry budgets, circuit accounting, stats) dispatches on
//! [`ErrorKind`], a closed classification produced by [`FerrymanError::kind`].
//! Workers translate their transport-level failures into `FerrymanError` at
//! the call boundary; nothing downstream inspects error message strings.

use std::time::Duration;

/// Closed set of error classes used by retry and stats policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure reaching the remote service.
    Connection,
    /// The caller-side deadline elapsed before a result arrived.
    Timeout,
    /// The remote service asked us to slow down.
    RateLimited,
    /// The circuit breaker refused the call without attempting it.
    CircuitOpen,
    /// Anything else.
    Other,
}

/// Ferryman error types
#[derive(Debug, thiserror::Error)]
pub enum FerrymanError {
    // Remote-call errors (produced by workers or the deadline runner)
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("deadline of {deadline:?} exceeded")]
    Timeout { deadline: Duration },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Generic worker failure. Treated as transient unless proven otherwise.
    #[error("worker error: {0}")]
    Worker(String),

    // Local policy errors
    #[error("circuit open, retry in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    /// Terminal failure after all retry budgets are exhausted.
    #[error("processing failed after {attempts} attempts: {source}")]
    ProcessingFailed {
        attempts: u32,
        source: Box<FerrymanError>,
    },

    // Contract violations — never retried
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Construction-time errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Cache errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache I/O error: {0}")]
    CacheIo(String),
}

impl FerrymanError {
    /// Classify this error into the closed [`ErrorKind`] set.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FerrymanError::Connection(_) => ErrorKind::Connection,
            FerrymanError::Timeout { .. } => ErrorKind::Timeout,
            FerrymanError::RateLimited { .. } => ErrorKind::RateLimited,
            FerrymanError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            _ => ErrorKind::Other,
        }
    }

    /// Whether retrying this error could plausibly succeed.
    ///
    /// `CircuitOpen` is deliberately not transient: retrying it would pile
    /// load on an endpoint the breaker has already judged unhealthy.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FerrymanError::Connection(_)
                | FerrymanError::Timeout { .. }
                | FerrymanError::RateLimited { .. }
                | FerrymanError::Worker(_)
        )
    }

    /// Extract the provider's `retry_after` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FerrymanError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Ferryman operations
pub type Result<T> = std::result::Result<T, FerrymanError>;
