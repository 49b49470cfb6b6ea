// crates/monitord-resilience/src/circuit_breaker.rs
// ============================================================================
// Module: Circuit Breaker
// Description: Per-upstream failure isolation with a Closed/Open/HalfOpen
//              state machine.
// Purpose: Stop a probe hammering a dead upstream; fail fast while open, let
//          a bounded number of trial calls through once the reset timeout
//          elapses, and close again only once those trials succeed.
// Dependencies: std::sync::Mutex, monitord_core::time
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use monitord_core::time::Clock;
use monitord_core::time::MillisSinceEpoch;
use thiserror::Error;

/// Observable state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures accumulate towards `failure_threshold`.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// A bounded number of trial calls are let through to probe recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(label)
    }
}

/// Tuning parameters for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` state before tripping to `Open`.
    pub failure_threshold: u32,
    /// How long the breaker stays `Open` before allowing trial calls.
    pub reset_timeout: Duration,
    /// Concurrent trial calls allowed while `HalfOpen`; the first
    /// `half_open_max_attempts` successes close the breaker, the first
    /// failure reopens it.
    pub half_open_max_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(30), half_open_max_attempts: 1 }
    }
}

/// A rejection from [`CircuitBreaker::before_call`] or [`CircuitBreaker::call`].
#[derive(Debug, Error)]
#[error("circuit '{service}' is open, retry after {retry_after_ms}ms")]
pub struct CircuitOpenError {
    /// Name of the protected upstream, for logging.
    pub service: String,
    /// Milliseconds remaining before a trial call is allowed.
    pub retry_after_ms: u64,
}

/// Either the circuit rejected the call, or the wrapped call itself failed.
#[derive(Debug, Error)]
pub enum CircuitCallError<E> {
    /// The circuit is open; the call was never attempted.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
    /// The call was attempted and failed.
    #[error("call failed: {0}")]
    Inner(E),
}

/// Point-in-time metrics for a [`CircuitBreaker`], for health/admin surfaces.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures observed in the current `Closed` run.
    pub consecutive_failures: u32,
    /// When the breaker last tripped to `Open`, if it ever has.
    pub opened_at: Option<MillisSinceEpoch>,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<MillisSinceEpoch>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

/// Per-upstream failure isolation.
///
/// # Invariants
/// - `HalfOpen` never admits more than `half_open_max_attempts` concurrent
///   trial calls.
/// - A single failure observed while `HalfOpen` reopens the breaker
///   immediately, discarding any successes already counted that round.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Builds a breaker named `name` (used only in error messages and
    /// metrics), starting `Closed`.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(Inner { state: CircuitState::Closed, consecutive_failures: 0, opened_at: None, half_open_in_flight: 0, half_open_successes: 0 }),
        }
    }

    /// Returns the breaker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether a call may proceed right now, and if so reserves a
    /// trial slot when `HalfOpen`. Callers must report the outcome via
    /// [`Self::record_success`] or [`Self::record_failure`].
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] when the breaker is `Open` (reset
    /// timeout not yet elapsed) or `HalfOpen` with no trial slots free.
    pub fn before_call(&self) -> Result<(), CircuitOpenError> {
        let now = self.clock.now_millis();
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        self.transition_if_due(&mut inner, now);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_sub(opened_at).max(0) as u64;
                let retry_after_ms = u64::try_from(self.config.reset_timeout.as_millis()).unwrap_or(u64::MAX).saturating_sub(elapsed);
                Err(CircuitOpenError { service: self.name.clone(), retry_after_ms })
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_attempts {
                    inner.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(CircuitOpenError { service: self.name.clone(), retry_after_ms: 0 })
                }
            }
        }
    }

    /// Records a successful call admitted by [`Self::before_call`].
    pub fn record_success(&self) {
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max_attempts {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                    inner.half_open_in_flight = 0;
                    inner.half_open_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed call admitted by [`Self::before_call`].
    pub fn record_failure(&self) {
        let now = self.clock.now_millis();
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.half_open_in_flight = 0;
                inner.half_open_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Forces the breaker back to `Closed`, discarding any accumulated
    /// failure count. Intended for an operator-triggered reset, not for use
    /// by probes themselves.
    pub fn reset(&self) {
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
    }

    /// Returns a snapshot of the breaker's current metrics.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now_millis();
        #[allow(clippy::unwrap_used)]
        let mut inner = self.inner.lock().unwrap();
        self.transition_if_due(&mut inner, now);
        CircuitBreakerMetrics { state: inner.state, consecutive_failures: inner.consecutive_failures, opened_at: inner.opened_at }
    }

    /// Runs `f`, gating it on [`Self::before_call`] and reporting its
    /// outcome automatically.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitCallError::Open`] without running `f` when the
    /// circuit rejects the call, or [`CircuitCallError::Inner`] when `f`
    /// itself fails.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.before_call()?;
        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitCallError::Inner(err))
            }
        }
    }

    fn transition_if_due(&self, inner: &mut Inner, now: MillisSinceEpoch) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                let reset_ms = i64::try_from(self.config.reset_timeout.as_millis()).unwrap_or(i64::MAX);
                if now.saturating_sub(opened_at) >= reset_ms {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = 0;
                    inner.half_open_successes = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use monitord_core::time::testing::FakeClock;

    use super::*;

    fn breaker(clock: Arc<FakeClock>, config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new("upstream", config, clock)
    }

    #[test]
    fn trips_open_after_consecutive_failures_then_fast_fails() {
        let clock = Arc::new(FakeClock::new(0));
        let config = CircuitBreakerConfig { failure_threshold: 3, reset_timeout: Duration::from_secs(10), half_open_max_attempts: 1 };
        let cb = breaker(clock, config);

        for _ in 0..3 {
            cb.before_call().expect("closed admits calls");
            cb.record_failure();
        }
        assert_eq!(cb.metrics().state, CircuitState::Open);
        assert!(cb.before_call().is_err());
    }

    #[test]
    fn half_opens_after_reset_timeout_and_closes_on_trial_success() {
        let clock = Arc::new(FakeClock::new(0));
        let config = CircuitBreakerConfig { failure_threshold: 1, reset_timeout: Duration::from_millis(1_000), half_open_max_attempts: 1 };
        let cb = breaker(Arc::clone(&clock), config);

        cb.before_call().expect("closed admits calls");
        cb.record_failure();
        assert_eq!(cb.metrics().state, CircuitState::Open);

        clock.advance(1_000);
        assert_eq!(cb.metrics().state, CircuitState::HalfOpen);

        cb.before_call().expect("half-open admits a trial");
        cb.record_success();
        assert_eq!(cb.metrics().state, CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let clock = Arc::new(FakeClock::new(0));
        let config = CircuitBreakerConfig { failure_threshold: 1, reset_timeout: Duration::from_millis(500), half_open_max_attempts: 2 };
        let cb = breaker(Arc::clone(&clock), config);

        cb.before_call().expect("closed admits calls");
        cb.record_failure();
        clock.advance(500);
        assert_eq!(cb.metrics().state, CircuitState::HalfOpen);

        cb.before_call().expect("half-open admits a trial");
        cb.record_failure();
        assert_eq!(cb.metrics().state, CircuitState::Open);
    }

    #[test]
    fn manual_reset_clears_open_state() {
        let clock = Arc::new(FakeClock::new(0));
        let config = CircuitBreakerConfig { failure_threshold: 1, reset_timeout: Duration::from_secs(600), half_open_max_attempts: 1 };
        let cb = breaker(clock, config);
        cb.before_call().expect("closed admits calls");
        cb.record_failure();
        assert_eq!(cb.metrics().state, CircuitState::Open);
        cb.reset();
        assert_eq!(cb.metrics().state, CircuitState::Closed);
        assert!(cb.before_call().is_ok());
    }

    #[tokio::test]
    async fn call_wraps_outcome_and_trips_on_repeated_failure() {
        let clock = Arc::new(FakeClock::new(0));
        let config = CircuitBreakerConfig { failure_threshold: 1, reset_timeout: Duration::from_secs(60), half_open_max_attempts: 1 };
        let cb = breaker(clock, config);

        let first: Result<u32, CircuitCallError<&str>> = cb.call(|| async { Err("boom") }).await;
        assert!(matches!(first, Err(CircuitCallError::Inner("boom"))));

        let second: Result<u32, CircuitCallError<&str>> = cb.call(|| async { Ok(7) }).await;
        assert!(matches!(second, Err(CircuitCallError::Open(_))));
    }
}
