//! Circuit breaker for the downstream API.
//!
//! Three-state machine, orthogonal to budget accounting:
//!
//! - **Closed** -- calls flow; consecutive failures are counted. Reaching
//!   `failure_threshold` trips the circuit to Open.
//! - **Open** -- calls fail fast without touching the remote until the
//!   cooldown elapses, then exactly one probe is let through (Half-open).
//! - **Half-open** -- the probe's outcome decides: success closes the
//!   circuit and resets the failure count, failure reopens it and restarts
//!   the cooldown.
//!
//! A call proceeds only if both this gate and the budget check admit it;
//! neither subsumes the other. State is process-local and resets on restart.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use tollgate_types::config::BreakerConfig;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls fail fast until the cooldown elapses.
    Open,
    /// One probe call is in flight; its outcome decides the next state.
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Set whenever `state == Open`.
    opened_at: Option<Instant>,
    /// A Half-open probe has been claimed and its outcome is pending.
    probe_in_flight: bool,
}

/// Shared circuit breaker guarding all outbound calls to the downstream API.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Create a closed breaker from configuration.
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            failure_threshold: config.failure_threshold,
            cooldown: config.cooldown(),
        }
    }

    /// Current state, for observability.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Non-mutating admission check.
    ///
    /// Returns the remaining cooldown when the circuit is open and the
    /// cooldown has not yet elapsed. Does NOT claim the Half-open probe;
    /// probe arbitration happens in [`try_acquire`] when the call is
    /// actually placed.
    ///
    /// [`try_acquire`]: CircuitBreaker::try_acquire
    pub fn check(&self) -> std::result::Result<(), Duration> {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let opened_at = inner
                    .opened_at
                    .expect("open circuit must record opened_at");
                match self.cooldown.checked_sub(opened_at.elapsed()) {
                    Some(remaining) if remaining > Duration::ZERO => Err(remaining),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Mutating gate consulted immediately before a remote call.
    ///
    /// - Closed: admit.
    /// - Open, cooldown pending: deny with the remaining cooldown.
    /// - Open, cooldown elapsed: transition to Half-open and admit the
    ///   caller as the single probe.
    /// - Half-open with the probe pending: deny; the hint is a full
    ///   cooldown since the probe's outcome is not yet known.
    pub fn try_acquire(&self) -> std::result::Result<(), Duration> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at = inner
                    .opened_at
                    .expect("open circuit must record opened_at");
                match self.cooldown.checked_sub(opened_at.elapsed()) {
                    Some(remaining) if remaining > Duration::ZERO => Err(remaining),
                    _ => {
                        info!("circuit half-open: admitting probe call");
                        inner.state = CircuitState::HalfOpen;
                        inner.probe_in_flight = true;
                        Ok(())
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.cooldown)
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful remote call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != CircuitState::Closed {
            info!("circuit closed: probe succeeded");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    /// Record a failed remote call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                // Probe failed: reopen and restart the cooldown.
                warn!(
                    cooldown_secs = self.cooldown.as_secs(),
                    "circuit reopened: probe failed"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
            }
            CircuitState::Closed | CircuitState::Open => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.state == CircuitState::Closed
                    && inner.consecutive_failures >= self.failure_threshold
                {
                    warn!(
                        failures = inner.consecutive_failures,
                        cooldown_secs = self.cooldown.as_secs(),
                        "circuit opened: failure threshold reached"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
        }
    }

    /// Consecutive failure count, for observability.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("breaker lock poisoned")
            .consecutive_failures
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        f.debug_struct("CircuitBreaker")
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .field("failure_threshold", &self.failure_threshold)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}
