//! Telemetry metric name constants.
//!
//! Centralised metric names for ferryman operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `ferryman_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — worker operation name (e.g. "sentiment", "themes")
//! - `status` — outcome: "ok" or "error"
//! - `state` — circuit breaker state after a transition

/// Total batch executions dispatched through the executor, labelled by
/// final outcome after retries.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "ferryman_requests_total";

/// Remote-call duration in seconds, measured per batch attempt.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "ferryman_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "ferryman_retries_total";

/// Total response-cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "ferryman_cache_hits_total";

/// Total response-cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "ferryman_cache_misses_total";

/// Total circuit breaker state transitions.
///
/// Labels: `state` (the state transitioned into).
pub const CIRCUIT_TRANSITIONS_TOTAL: &str = "ferryman_circuit_transitions_total";

/// Time spent blocked in rate-limiter admission, in seconds.
pub const RATE_LIMIT_WAIT_SECONDS: &str = "ferryman_rate_limit_wait_seconds";

/// Current adaptive rate-limit ceiling (calls per window).
pub const RATE_LIMIT_CEILING: &str = "ferryman_rate_limit_ceiling";

/// Total batches that failed permanently after retry exhaustion.
///
/// Labels: `operation`.
pub const BATCHES_FAILED_TOTAL: &str = "ferryman_batches_failed_total";
