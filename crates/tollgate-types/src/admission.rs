//! Admission, estimation, and consumption value objects.
//!
//! These are the ephemeral values exchanged between the guard layer and its
//! callers. All are serde-serializable so the consuming application's API
//! boundary can translate them into transport-level representations (HTTP
//! status + headers, RPC errors) without re-mapping fields.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TollgateError;

// ── Balance reading ──────────────────────────────────────────────────────

/// Outcome of a balance check.
///
/// The authoritative source may omit the balance signal on some responses.
/// That case is modelled explicitly rather than defaulted to a permissive
/// value: `Unknown` is treated as insufficient by the admission guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceReading {
    /// The balance is known (cached within TTL, or freshly reconciled).
    Known(u64),
    /// The authoritative source reported no balance signal.
    Unknown,
}

// ── Admission decision ───────────────────────────────────────────────────

/// Why an admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The circuit breaker is open; no remote call was attempted.
    CircuitOpen,
    /// The authoritative source did not report a balance.
    UnknownBalance,
    /// The tracked balance cannot cover the action's cost.
    InsufficientBudget,
}

/// The decision returned by the admission guard.
///
/// On a granted decision `balance` is the tracked balance after the
/// decrement. On a denial it is the balance the decision was based on
/// (conservatively 0 when the circuit was open or the signal was absent,
/// since the tracker was not, or could not be, consulted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// Whether the action may proceed.
    pub allowed: bool,

    /// Tracked balance (post-decrement when allowed).
    pub balance: u64,

    /// Fixed cost of the requested action.
    pub required: u64,

    /// `required - balance` on a budget denial, 0 otherwise.
    pub deficit: u64,

    /// Suggested wait before retrying, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,

    /// Present on denials only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl AdmissionDecision {
    /// Build a granted decision.
    pub fn granted(balance_after: u64, required: u64) -> Self {
        Self {
            allowed: true,
            balance: balance_after,
            required,
            deficit: 0,
            retry_after_ms: None,
            reason: None,
        }
    }

    /// Build a budget denial.
    pub fn insufficient(balance: u64, required: u64, retry_after: Option<Duration>) -> Self {
        Self {
            allowed: false,
            balance,
            required,
            deficit: required.saturating_sub(balance),
            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            reason: Some(DenialReason::InsufficientBudget),
        }
    }

    /// Build a denial for an absent balance signal.
    pub fn unknown_balance(required: u64, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            balance: 0,
            required,
            deficit: required,
            retry_after_ms: Some(retry_after.as_millis() as u64),
            reason: Some(DenialReason::UnknownBalance),
        }
    }

    /// Build a fail-fast denial for an open circuit.
    pub fn circuit_open(required: u64, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            balance: 0,
            required,
            deficit: 0,
            retry_after_ms: Some(retry_after.as_millis() as u64),
            reason: Some(DenialReason::CircuitOpen),
        }
    }

    /// The retry hint as a [`Duration`], if present.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }

    /// Map a denial to its typed error, for callers that propagate with `?`
    /// at their own boundary. Returns `None` on a granted decision.
    pub fn denial_error(&self) -> Option<TollgateError> {
        match self.reason? {
            DenialReason::CircuitOpen => Some(TollgateError::CircuitOpen {
                retry_after_ms: self.retry_after_ms.unwrap_or(0),
            }),
            DenialReason::UnknownBalance => Some(TollgateError::UnknownBudgetSignal {
                required: self.required,
            }),
            DenialReason::InsufficientBudget => Some(TollgateError::InsufficientBudget {
                balance: self.balance,
                required: self.required,
                deficit: self.deficit,
                retry_after_ms: self.retry_after_ms,
            }),
        }
    }
}

// ── Job estimation ───────────────────────────────────────────────────────

/// Description of a composite job: one discovery call plus N item lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    /// Fixed cost of the discovery call.
    pub discovery_cost: u64,

    /// Fixed cost per item lookup.
    pub per_item_cost: u64,

    /// Predicted number of item lookups.
    pub predicted_item_count: u64,
}

/// Predicted total cost of a composite job.
///
/// Produced by the cost estimator; owns no state and never mutates the
/// budget tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCostEstimate {
    /// Fixed cost of the discovery call.
    pub discovery_cost: u64,

    /// Fixed cost per item lookup.
    pub per_item_cost: u64,

    /// Predicted number of item lookups.
    pub predicted_item_count: u64,

    /// Percentage buffer applied to the raw total.
    pub safety_margin_pct: u64,

    /// Margin-adjusted predicted total (ceiling-rounded).
    pub total_estimated: u64,
}

// ── Job validation ───────────────────────────────────────────────────────

/// Outcome of pre-flight job validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ValidationResult {
    /// The job may start. The admission guard still re-checks budget per
    /// sub-action as the job executes.
    Approved,

    /// The estimate exceeds the per-job hard cap. Structural: reported with
    /// precedence over a reserve breach when both trip.
    JobTooExpensive {
        /// Margin-adjusted estimated total.
        estimated: u64,
        /// Configured per-job cap.
        max_cost_per_job: u64,
    },

    /// Running the job would drop the balance below the protected floor.
    InsufficientReserve {
        /// Balance at validation time.
        balance: u64,
        /// Margin-adjusted estimated total.
        estimated: u64,
        /// Configured minimum post-job balance.
        min_reserve: u64,
    },
}

impl ValidationResult {
    /// True when the job may start.
    pub fn is_approved(&self) -> bool {
        matches!(self, ValidationResult::Approved)
    }

    /// Map a rejection to its typed error. Returns `None` when approved.
    pub fn into_error(self) -> Option<TollgateError> {
        match self {
            ValidationResult::Approved => None,
            ValidationResult::JobTooExpensive {
                estimated,
                max_cost_per_job,
            } => Some(TollgateError::JobTooExpensive {
                estimated,
                max_cost_per_job,
            }),
            ValidationResult::InsufficientReserve {
                balance,
                estimated,
                min_reserve,
            } => Some(TollgateError::InsufficientReserve {
                balance,
                estimated,
                min_reserve,
            }),
        }
    }
}

// ── Consumption records ──────────────────────────────────────────────────

/// One guarded call's budget effect, for observability only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// The admitted action.
    pub action: String,

    /// Tracked balance before the decrement.
    pub balance_before: u64,

    /// Tracked balance after the decrement.
    pub balance_after: u64,

    /// When the admission happened.
    pub at: DateTime<Utc>,
}

impl ConsumptionRecord {
    /// Units consumed by this call.
    pub fn consumed(&self) -> u64 {
        self.balance_before.saturating_sub(self.balance_after)
    }
}

/// One denied admission attempt, for observability only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionRecord {
    /// The denied action.
    pub action: String,

    /// Balance the denial was based on.
    pub balance: u64,

    /// Cost of the denied action.
    pub required: u64,

    /// `required - balance` at denial time.
    pub deficit: u64,

    /// Why the admission was denied.
    pub reason: DenialReason,

    /// When the denial happened.
    pub at: DateTime<Utc>,
}
