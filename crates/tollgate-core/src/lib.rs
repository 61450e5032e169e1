//! # tollgate-core
//!
//! Budget admission control and resilience engine for applications that sit
//! in front of a rate/cost-limited external API. The engine decides, just
//! before each costly action, whether it may proceed given the tracked
//! budget balance and the health of the downstream dependency, and bounds
//! composite jobs with pre-flight cost caps and deadlines.
//!
//! Components (see [`guard`]):
//!
//! - **[`guard::registry`]** -- action-name -> fixed-cost table with a
//!   startup completeness check
//! - **[`guard::budget`]** -- TTL-cached balance tracking with atomic
//!   check-and-decrement
//! - **[`guard::breaker`]** -- three-state circuit breaker for the
//!   downstream API
//! - **[`guard::admission`]** -- the per-action admission guard and the
//!   [`Tollgate`] wiring struct
//! - **[`guard::estimator`]** / **[`guard::validator`]** -- pre-flight cost
//!   estimation and job caps
//! - **[`guard::gate`]** -- semaphore-bounded remote-call execution
//! - **[`guard::deadline`]** -- cooperative deadline envelope
//! - **[`guard::consumption`]** -- append-only observability log
//!
//! The engine is an in-process library: it defines no wire protocol and
//! leaves transport-level translation of decisions to the consuming
//! application's own API boundary.

pub mod guard;

pub use guard::admission::{AdmissionGuard, Tollgate};
pub use guard::breaker::{CircuitBreaker, CircuitState};
pub use guard::budget::{BudgetTracker, ConsumeOutcome};
pub use guard::consumption::ConsumptionTracker;
pub use guard::deadline::run_with_deadline;
pub use guard::estimator::CostEstimator;
pub use guard::gate::RemoteGate;
pub use guard::registry::ActionCostRegistry;
pub use guard::traits::{BalanceSource, StaticBalanceSource};
pub use guard::validator::JobValidator;
