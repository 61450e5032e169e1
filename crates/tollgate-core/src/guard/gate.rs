//! Remote-call gate.
//!
//! Bounds the number of simultaneous in-flight calls to the downstream API
//! with a counting semaphore (callers beyond the limit queue FIFO rather
//! than failing) and feeds every call outcome to the circuit breaker. This
//! is a distinct, composable constraint from the budget check: a call must
//! be budget-admitted before it reaches the gate, and can still fail fast
//! here if the circuit is open.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use tollgate_types::config::RemoteConfig;
use tollgate_types::error::{Result, TollgateError};

use super::breaker::CircuitBreaker;

/// Semaphore-bounded, breaker-gated executor for outbound calls.
pub struct RemoteGate {
    semaphore: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
    max_in_flight: usize,
}

impl RemoteGate {
    /// Create a gate with the configured in-flight cap.
    pub fn new(config: &RemoteConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_in_flight)),
            breaker,
            max_in_flight: config.max_in_flight,
        }
    }

    /// Execute a remote call under the gate.
    ///
    /// Waits for an in-flight slot (FIFO), then consults the breaker with
    /// fresh state -- a caller that queued through an outage re-checks after
    /// the wait rather than relying on what it saw before. The call's
    /// outcome is recorded on the breaker either way.
    pub async fn call<F, Fut, T>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit =
            self.semaphore
                .acquire()
                .await
                .map_err(|_| TollgateError::Source {
                    message: "remote gate closed".into(),
                })?;

        if let Err(remaining) = self.breaker.try_acquire() {
            debug!(operation, "remote call refused: circuit open");
            return Err(TollgateError::CircuitOpen {
                retry_after_ms: remaining.as_millis() as u64,
            });
        }

        let result = call().await;
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(err) => {
                debug!(operation, %err, "remote call failed");
                self.breaker.record_failure();
            }
        }
        result
    }

    /// Currently free in-flight slots.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// The configured in-flight cap.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

impl std::fmt::Debug for RemoteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGate")
            .field("max_in_flight", &self.max_in_flight)
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tollgate_types::config::BreakerConfig;

    fn gate(max_in_flight: usize, failure_threshold: u32) -> RemoteGate {
        let breaker = Arc::new(CircuitBreaker::new(&BreakerConfig {
            failure_threshold,
            cooldown_seconds: 60,
        }));
        RemoteGate::new(&RemoteConfig { max_in_flight }, breaker)
    }

    #[tokio::test]
    async fn successful_call_passes_through() {
        let gate = gate(3, 5);
        let result = gate.call("lookup", || async { Ok(42u64) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(gate.available_slots(), 3);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_cap() {
        let gate = Arc::new(gate(2, 100));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let gate = Arc::clone(&gate);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                gate.call("lookup", || async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "peak in-flight {} exceeded cap 2",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn failures_trip_breaker_and_fail_fast() {
        let gate = gate(3, 2);
        let invocations = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: Result<()> = gate
                .call("lookup", || async {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Err(TollgateError::Source {
                        message: "upstream 503".into(),
                    })
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 2);

        // Circuit is now open: the closure must not run.
        let result: Result<()> = gate
            .call("lookup", || async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(TollgateError::CircuitOpen { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 2, "no remote invocation while open");
    }

    #[tokio::test]
    async fn success_after_recovery_closes_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(&BreakerConfig {
            failure_threshold: 1,
            cooldown_seconds: 0, // probe admitted immediately
        }));
        let gate = RemoteGate::new(&RemoteConfig { max_in_flight: 3 }, Arc::clone(&breaker));

        let failing: Result<()> = gate
            .call("lookup", || async {
                Err(TollgateError::Source {
                    message: "upstream 503".into(),
                })
            })
            .await;
        assert!(failing.is_err());

        // Zero cooldown: the next call is the half-open probe; it succeeds
        // and the circuit closes.
        let result = gate.call("lookup", || async { Ok(7u64) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(
            breaker.state(),
            crate::guard::breaker::CircuitState::Closed
        );
    }
}
