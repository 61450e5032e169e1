//! Budget tracker.
//!
//! Holds the process-wide view of the external budget balance: a cached
//! value refreshed lazily from the authoritative source once the TTL
//! expires, with optimistic local decrements interpolating between
//! refreshes. The authoritative value always wins on reconcile.
//!
//! # Concurrency
//!
//! All state lives behind one `tokio::sync::Mutex`, held across the refresh
//! await, so the check-then-decrement pair in [`try_consume`] is atomic.
//! Two concurrent admissions racing for a balance that covers only one of
//! them cannot both observe "sufficient" -- the second sees the first's
//! decrement.
//!
//! # Fail-safe
//!
//! A refresh that returns no balance signal leaves the tracker in an
//! *unknown* state, which the admission guard treats as insufficient. A
//! refresh that fails at the transport level keeps serving the stale cached
//! value and is retried on the next check.
//!
//! [`try_consume`]: BudgetTracker::try_consume

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use tollgate_types::admission::BalanceReading;
use tollgate_types::config::{BalanceLevel, BudgetConfig};

use super::traits::BalanceSource;

/// Outcome of an atomic check-and-decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The cost was covered and has been decremented.
    Admitted {
        /// Balance before the decrement.
        before: u64,
        /// Balance after the decrement.
        after: u64,
    },
    /// The balance cannot cover the cost. Nothing was decremented.
    Insufficient {
        /// The balance the decision was based on.
        balance: u64,
    },
    /// The balance is unknown (signal absent). Nothing was decremented.
    Unknown,
}

struct BudgetState {
    balance: u64,
    /// False until the source has reported a balance at least once, or
    /// after the latest refresh came back without a signal.
    have_signal: bool,
    /// None until the first refresh attempt completes with a response.
    last_refresh: Option<Instant>,
}

/// Process-wide budget balance tracker.
pub struct BudgetTracker {
    state: Mutex<BudgetState>,
    source: Arc<dyn BalanceSource>,
    refresh_ttl: Duration,
    refill_per_minute: u64,
    unknown_retry: Duration,
    config: BudgetConfig,
}

impl BudgetTracker {
    /// Create a tracker with no known balance. The first check (or an
    /// explicit [`refresh`]) performs the initial authoritative fetch.
    ///
    /// [`refresh`]: BudgetTracker::refresh
    pub fn new(config: BudgetConfig, source: Arc<dyn BalanceSource>) -> Self {
        Self {
            state: Mutex::new(BudgetState {
                balance: 0,
                have_signal: false,
                last_refresh: None,
            }),
            source,
            refresh_ttl: config.refresh_ttl(),
            refill_per_minute: config.refill_per_minute,
            unknown_retry: config.unknown_retry(),
            config,
        }
    }

    /// Current balance, refreshing from the authoritative source when the
    /// cache window has expired.
    pub async fn check_balance(&self) -> BalanceReading {
        let mut state = self.state.lock().await;
        self.refresh_if_stale(&mut state).await;
        if state.have_signal {
            BalanceReading::Known(state.balance)
        } else {
            BalanceReading::Unknown
        }
    }

    /// Atomic check-then-decrement under a single lock hold.
    ///
    /// This is the only entry point the admission guard uses on the hot
    /// path; it closes the window in which two callers could both read a
    /// stale "sufficient" balance.
    pub async fn try_consume(&self, cost: u64) -> ConsumeOutcome {
        let mut state = self.state.lock().await;
        self.refresh_if_stale(&mut state).await;

        if !state.have_signal {
            return ConsumeOutcome::Unknown;
        }
        if state.balance >= cost {
            let before = state.balance;
            state.balance -= cost;
            ConsumeOutcome::Admitted {
                before,
                after: state.balance,
            }
        } else {
            ConsumeOutcome::Insufficient {
                balance: state.balance,
            }
        }
    }

    /// Subtract `n` from the balance, clamped at zero.
    ///
    /// Called only after a call has been admitted, never speculatively.
    /// Clamping indicates the optimistic bookkeeping drifted from the
    /// authoritative value; the next reconcile will correct it.
    pub async fn decrement(&self, n: u64) {
        let mut state = self.state.lock().await;
        if n > state.balance {
            warn!(
                balance = state.balance,
                decrement = n,
                "budget accounting drift: decrement exceeds tracked balance, clamping to 0"
            );
            state.balance = 0;
        } else {
            state.balance -= n;
        }
    }

    /// Overwrite the tracked balance with an authoritative value.
    ///
    /// The authoritative value always wins; local decrements are only an
    /// interpolation between refreshes.
    pub async fn reconcile(&self, authoritative: u64) {
        let mut state = self.state.lock().await;
        if state.have_signal && state.balance != authoritative {
            debug!(
                local = state.balance,
                authoritative, "reconciling tracked balance with authoritative value"
            );
        }
        state.balance = authoritative;
        state.have_signal = true;
        state.last_refresh = Some(Instant::now());
    }

    /// Force an authoritative refresh regardless of the TTL.
    ///
    /// Used at process start so the tracker begins from a real balance.
    /// Returns what the tracker knows afterwards; a transport failure is
    /// logged, not escalated, and leaves the previous reading in place.
    pub async fn refresh(&self) -> BalanceReading {
        let mut state = self.state.lock().await;
        self.fetch_and_apply(&mut state).await;
        if state.have_signal {
            BalanceReading::Known(state.balance)
        } else {
            BalanceReading::Unknown
        }
    }

    /// Suggested wait for a deficit to refill.
    ///
    /// Derived from the configured refill rate; with no modelled refill the
    /// hint falls back to the refresh TTL so callers re-poll the
    /// authoritative source instead of waiting forever.
    pub fn retry_after(&self, deficit: u64) -> Duration {
        if self.refill_per_minute == 0 {
            return self.refresh_ttl;
        }
        let seconds = (deficit.saturating_mul(60)).div_ceil(self.refill_per_minute);
        Duration::from_secs(seconds)
    }

    /// Suggested wait when the balance signal is absent.
    pub fn unknown_retry(&self) -> Duration {
        self.unknown_retry
    }

    /// The budget configuration this tracker was built from.
    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Refresh when the cache window has expired (or never started).
    async fn refresh_if_stale(&self, state: &mut BudgetState) {
        let stale = match state.last_refresh {
            None => true,
            Some(at) => at.elapsed() > self.refresh_ttl,
        };
        if stale {
            self.fetch_and_apply(state).await;
        }
    }

    /// One authoritative fetch, applied to the locked state.
    async fn fetch_and_apply(&self, state: &mut BudgetState) {
        match self.source.fetch_balance().await {
            Ok(Some(balance)) => {
                if state.have_signal && state.balance != balance {
                    debug!(
                        local = state.balance,
                        authoritative = balance,
                        "refresh: authoritative balance overrides local bookkeeping"
                    );
                }
                state.balance = balance;
                state.have_signal = true;
                state.last_refresh = Some(Instant::now());
            }
            Ok(None) => {
                warn!("refresh: authoritative response carried no balance signal");
                state.have_signal = false;
                state.last_refresh = Some(Instant::now());
            }
            Err(err) => {
                // Keep the stale value; last_refresh is untouched so the
                // next check retries the source.
                let level = self.config.thresholds.classify(state.balance);
                if state.have_signal && level == BalanceLevel::Critical {
                    error!(
                        balance = state.balance,
                        %err,
                        "refresh failed with balance at critical watermark"
                    );
                } else {
                    warn!(%err, "refresh failed, serving stale balance");
                }
            }
        }
    }
}

impl std::fmt::Debug for BudgetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetTracker")
            .field("refresh_ttl", &self.refresh_ttl)
            .field("refill_per_minute", &self.refill_per_minute)
            .finish()
    }
}
