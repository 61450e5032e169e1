//! Pre-flight job validation.
//!
//! Applies the hard caps to a job estimate before the job is allowed to
//! start: a per-job cost ceiling (structural, balance-independent) and a
//! minimum-reserve floor (protects other concurrent consumers). Validation
//! runs once per job submission; the admission guard still re-checks budget
//! per individual sub-action as the job executes, so estimate drift is
//! expected and tolerated.

use tollgate_types::admission::{JobCostEstimate, ValidationResult};
use tollgate_types::config::JobLimitsConfig;

/// Validates job estimates against the configured caps.
#[derive(Debug, Clone, Copy)]
pub struct JobValidator {
    max_cost_per_job: u64,
    min_reserve: u64,
}

impl JobValidator {
    /// Create a validator from the configured job limits.
    pub fn new(limits: &JobLimitsConfig) -> Self {
        Self {
            max_cost_per_job: limits.max_cost_per_job,
            min_reserve: limits.min_reserve,
        }
    }

    /// Validate an estimate against the caps, given the current balance.
    ///
    /// Both checks are evaluated; when both trip, `JobTooExpensive` wins in
    /// the report since it is the structural, balance-independent violation.
    pub fn validate(&self, estimate: &JobCostEstimate, current_balance: u64) -> ValidationResult {
        let too_expensive = estimate.total_estimated > self.max_cost_per_job;
        let reserve_breached =
            current_balance.saturating_sub(estimate.total_estimated) < self.min_reserve;

        if too_expensive {
            return ValidationResult::JobTooExpensive {
                estimated: estimate.total_estimated,
                max_cost_per_job: self.max_cost_per_job,
            };
        }
        if reserve_breached {
            return ValidationResult::InsufficientReserve {
                balance: current_balance,
                estimated: estimate.total_estimated,
                min_reserve: self.min_reserve,
            };
        }
        ValidationResult::Approved
    }
}
