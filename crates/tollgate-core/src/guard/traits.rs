//! Trait seams for the guard engine.
//!
//! The engine never speaks the downstream protocol itself; the consuming
//! application implements [`BalanceSource`] against whatever response
//! metadata its provider exposes and injects it as an `Arc<dyn BalanceSource>`.

use async_trait::async_trait;

use tollgate_types::Result;

/// Authoritative source of the external budget balance.
///
/// Implementations typically read the balance from the downstream API's
/// response metadata. The signal may be absent on a given response; that
/// case is `Ok(None)` and must never be collapsed into a permissive default
/// -- the budget tracker treats it as an unknown balance, which the
/// admission guard denies conservatively.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Fetch the current balance.
    ///
    /// - `Ok(Some(n))` -- the source reported `n` remaining units.
    /// - `Ok(None)` -- the source responded but carried no balance signal.
    /// - `Err(_)` -- the source could not be reached; the tracker keeps
    ///   serving its stale cached value.
    async fn fetch_balance(&self) -> Result<Option<u64>>;
}

/// Fixed-balance source.
///
/// For tests, and for consumers that reconcile the tracker out-of-band via
/// [`BudgetTracker::reconcile`] instead of polling.
///
/// [`BudgetTracker::reconcile`]: crate::guard::budget::BudgetTracker::reconcile
pub struct StaticBalanceSource {
    balance: u64,
}

impl StaticBalanceSource {
    /// Create a source that always reports the given balance.
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }
}

#[async_trait]
impl BalanceSource for StaticBalanceSource {
    async fn fetch_balance(&self) -> Result<Option<u64>> {
        Ok(Some(self.balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_reports_fixed_balance() {
        let source = StaticBalanceSource::new(250);
        assert_eq!(source.fetch_balance().await.unwrap(), Some(250));
        // Repeated fetches are stable.
        assert_eq!(source.fetch_balance().await.unwrap(), Some(250));
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let source: std::sync::Arc<dyn BalanceSource> =
            std::sync::Arc::new(StaticBalanceSource::new(7));
        assert_eq!(source.fetch_balance().await.unwrap(), Some(7));
    }
}
