//! Circuit breaker for the remote endpoint.
//!
//! Tracks consecutive failures of the protected call and fails fast once
//! the endpoint looks unhealthy, giving it the cooldown period to recover.
//!
//! # State machine
//!
//! ```text
//! Closed ──(failure_count >= threshold)──► Open
//! Open ──(cooldown elapsed)──► HalfOpen
//! HalfOpen ──(success)──► Closed
//! HalfOpen ──(failure)──► Open
//! ```
//!
//! One breaker instance guards one logical endpoint; all concurrent workers
//! share it. State lives behind a single mutex, held only for bookkeeping,
//! never across the guarded call itself.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::telemetry;
use crate::{FerrymanError, Result};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Endpoint judged unhealthy; calls fail fast until the cooldown elapses.
    Open,
    /// Cooldown elapsed; the next call probes the endpoint.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Configuration for circuit breaker behaviour.
///
/// ```rust
/// # use ferryman::CircuitBreakerConfig;
/// # use std::time::Duration;
/// let config = CircuitBreakerConfig::new()
///     .failure_threshold(3)
///     .cooldown(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens. Default: 5.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing. Default: 60s.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the consecutive-failure threshold.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Set the open-state cooldown.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Shared circuit breaker guarding one remote endpoint.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Current state, for the stats surface.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failure count, for the stats surface.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Run `operation` under the breaker.
    ///
    /// Fails fast with [`FerrymanError::CircuitOpen`] when the circuit is
    /// open and the cooldown has not elapsed — `operation` is not invoked.
    /// Otherwise the operation's outcome drives the state machine and its
    /// result is returned unchanged.
    pub async fn guard<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.admit()?;
        match operation.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    fn admit(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    info!("circuit cooldown elapsed; probing endpoint");
                    Self::record_transition(CircuitState::HalfOpen);
                    Ok(())
                } else {
                    Err(FerrymanError::CircuitOpen {
                        retry_in: self.config.cooldown - elapsed,
                    })
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        if inner.state != CircuitState::Closed {
            inner.state = CircuitState::Closed;
            info!("circuit closed after successful probe");
            Self::record_transition(CircuitState::Closed);
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        let trip = inner.state == CircuitState::HalfOpen
            || inner.failure_count >= self.config.failure_threshold;
        if trip && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            warn!(
                failures = inner.failure_count,
                cooldown_secs = self.config.cooldown.as_secs(),
                "circuit opened; failing fast"
            );
            Self::record_transition(CircuitState::Open);
        }
    }

    fn record_transition(to: CircuitState) {
        metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL, "state" => to.as_str())
            .increment(1);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
