//! Pre-flight cost estimation for composite jobs.
//!
//! Pure and side-effect free: estimating never touches the budget tracker,
//! so a "preview cost" endpoint can call it arbitrarily often without
//! affecting admission state.

use tollgate_types::admission::{JobCostEstimate, JobDescription};

/// Computes the predicted total cost of a composite job
/// (one discovery call plus N item lookups).
#[derive(Debug, Clone, Copy)]
pub struct CostEstimator {
    safety_margin_pct: u64,
}

impl CostEstimator {
    /// Create an estimator with the given safety margin percentage.
    ///
    /// The margin guards against undercounting variable-cost remote calls;
    /// 15 means the raw total is inflated by 15%, ceiling-rounded.
    pub fn new(safety_margin_pct: u64) -> Self {
        Self { safety_margin_pct }
    }

    /// Predict the total cost of a job.
    ///
    /// `total = discovery + items * per_item`, inflated by the safety
    /// margin. All arithmetic saturates rather than wrapping on absurd
    /// inputs.
    pub fn estimate(&self, job: &JobDescription) -> JobCostEstimate {
        let raw = job
            .discovery_cost
            .saturating_add(job.per_item_cost.saturating_mul(job.predicted_item_count));
        let total_estimated = apply_margin(raw, self.safety_margin_pct);

        JobCostEstimate {
            discovery_cost: job.discovery_cost,
            per_item_cost: job.per_item_cost,
            predicted_item_count: job.predicted_item_count,
            safety_margin_pct: self.safety_margin_pct,
            total_estimated,
        }
    }
}

/// Inflate `raw` by `pct` percent, rounding up.
fn apply_margin(raw: u64, pct: u64) -> u64 {
    raw.saturating_mul(100 + pct).div_ceil(100)
}
