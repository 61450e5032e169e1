//! Error types for the tollgate admission-control library.
//!
//! Provides [`TollgateError`] as the top-level error type. The enum is
//! non-exhaustive to allow future extension without breaking downstream.

use thiserror::Error;

/// Top-level error type for the tollgate library.
///
/// Variants are grouped into recoverable (budget, circuit, deadline) and
/// fatal (configuration) categories. Recoverable variants carry enough
/// structured detail for a caller to present an actionable message; none of
/// them should surface as a generic 500-equivalent at the consumer's API
/// boundary.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TollgateError {
    // ── Recoverable ──────────────────────────────────────────────────

    /// The tracked balance cannot cover the requested action.
    ///
    /// Recoverable by waiting `retry_after_ms` (when a refill rate is
    /// configured) or by reducing scope.
    #[error("insufficient budget: balance {balance}, required {required} (deficit {deficit})")]
    InsufficientBudget {
        /// Balance known at decision time.
        balance: u64,
        /// Cost of the requested action.
        required: u64,
        /// `required - balance`.
        deficit: u64,
        /// Suggested wait before retrying, in milliseconds.
        retry_after_ms: Option<u64>,
    },

    /// The authoritative source did not report a balance.
    ///
    /// Treated conservatively as insufficient, but logged and surfaced
    /// distinctly so operators can tell signal loss from genuine exhaustion.
    #[error("budget balance unknown: authoritative source reported no signal (required {required})")]
    UnknownBudgetSignal {
        /// Cost of the action that was denied.
        required: u64,
    },

    /// The circuit breaker is open; the remote dependency is unstable.
    ///
    /// Callers should not retry before `retry_after_ms` has elapsed.
    #[error("circuit open: remote calls suspended for another {retry_after_ms}ms")]
    CircuitOpen {
        /// Remaining cooldown, in milliseconds.
        retry_after_ms: u64,
    },

    /// A composite job's estimated cost exceeds the per-job hard cap.
    ///
    /// Structural rejection, independent of the current balance; the caller
    /// must reduce job scope, not just wait.
    #[error("job too expensive: estimated {estimated} exceeds cap {max_cost_per_job}")]
    JobTooExpensive {
        /// Margin-adjusted estimated total cost.
        estimated: u64,
        /// Configured per-job cap.
        max_cost_per_job: u64,
    },

    /// Running the job would drop the balance below the protected floor.
    ///
    /// Distinct from per-action [`InsufficientBudget`]; the caller should
    /// wait for refill.
    ///
    /// [`InsufficientBudget`]: TollgateError::InsufficientBudget
    #[error("insufficient reserve: balance {balance} minus estimate {estimated} breaches floor {min_reserve}")]
    InsufficientReserve {
        /// Balance known at validation time.
        balance: u64,
        /// Margin-adjusted estimated total cost.
        estimated: u64,
        /// Configured minimum post-job balance.
        min_reserve: u64,
    },

    /// A composite job exceeded its deadline.
    ///
    /// Sub-operations that already committed their effects stand; only the
    /// decision to continue was cancelled.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Human-readable name of the operation that timed out.
        operation: String,
    },

    /// The authoritative balance source failed at the transport level.
    #[error("balance source error: {message}")]
    Source {
        /// Source-supplied error message.
        message: String,
    },

    // ── Fatal ────────────────────────────────────────────────────────

    /// An action name is not present in the cost registry.
    ///
    /// This is a wiring error, caught by the startup self-check. It must
    /// never surface as a per-request admission outcome.
    #[error("unknown action: '{action}' is not registered in the cost table")]
    UnknownAction {
        /// The unregistered action name.
        action: String,
    },

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl TollgateError {
    /// Returns true for conditions a caller can recover from by waiting or
    /// narrowing scope, false for wiring/configuration errors.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TollgateError::UnknownAction { .. } | TollgateError::ConfigInvalid { .. }
        )
    }
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TollgateError>;
