//! Admission guard and top-level wiring.
//!
//! [`AdmissionGuard`] is the single entry point consumers call immediately
//! before a costly action. Gate order:
//!
//! 1. Registry lookup -- an unknown action is a wiring error and fails
//!    loudly, never a per-request denial.
//! 2. Circuit check -- reflects remote health; checking it first avoids a
//!    wasted balance-refresh call when the remote is down.
//! 3. Atomic balance check-and-decrement -- the only state mutation, done
//!    synchronously with the decision. There is no reserve-then-commit
//!    phase: the downstream protocol has no reservation primitive, so a
//!    remote failure after admission does not restore the decremented
//!    budget.
//!
//! [`Tollgate`] wires the guard together with the estimator, validator,
//! remote gate, and deadline envelope behind one injectable service object.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use tollgate_types::admission::{
    AdmissionDecision, BalanceReading, ConsumptionRecord, DenialReason, JobCostEstimate,
    JobDescription, RejectionRecord, ValidationResult,
};
use tollgate_types::config::{BalanceLevel, GuardConfig, ThresholdsConfig};
use tollgate_types::error::Result;

use super::breaker::{CircuitBreaker, CircuitState};
use super::budget::{BudgetTracker, ConsumeOutcome};
use super::consumption::ConsumptionTracker;
use super::deadline::run_with_deadline;
use super::estimator::CostEstimator;
use super::gate::RemoteGate;
use super::registry::ActionCostRegistry;
use super::traits::BalanceSource;
use super::validator::JobValidator;

// ── AdmissionGuard ───────────────────────────────────────────────────────

/// Per-action admission decisions against the shared budget and circuit.
pub struct AdmissionGuard {
    registry: Arc<ActionCostRegistry>,
    budget: Arc<BudgetTracker>,
    breaker: Arc<CircuitBreaker>,
    consumption: Arc<ConsumptionTracker>,
    thresholds: ThresholdsConfig,
}

impl AdmissionGuard {
    /// Wire a guard over shared components.
    pub fn new(
        registry: Arc<ActionCostRegistry>,
        budget: Arc<BudgetTracker>,
        breaker: Arc<CircuitBreaker>,
        consumption: Arc<ConsumptionTracker>,
        thresholds: ThresholdsConfig,
    ) -> Self {
        Self {
            registry,
            budget,
            breaker,
            consumption,
            thresholds,
        }
    }

    /// Decide whether `action` may proceed, consuming its cost if so.
    ///
    /// Returns `Err` only for the fatal unknown-action wiring error; every
    /// expected condition (open circuit, unknown balance, insufficiency) is
    /// a denied [`AdmissionDecision`] carrying structured detail.
    pub async fn admit(&self, action: &str) -> Result<AdmissionDecision> {
        let required = self.registry.cost_of(action)?;

        if let Err(remaining) = self.breaker.check() {
            warn!(
                action,
                retry_after_ms = remaining.as_millis() as u64,
                "admission denied: circuit open"
            );
            self.record_rejection(action, 0, required, 0, DenialReason::CircuitOpen);
            return Ok(AdmissionDecision::circuit_open(required, remaining));
        }

        match self.budget.try_consume(required).await {
            ConsumeOutcome::Admitted { before, after } => {
                self.consumption.record(ConsumptionRecord {
                    action: action.to_string(),
                    balance_before: before,
                    balance_after: after,
                    at: Utc::now(),
                });
                match self.thresholds.classify(after) {
                    BalanceLevel::Critical => warn!(
                        action,
                        balance = after,
                        "admission granted with balance at critical watermark"
                    ),
                    BalanceLevel::Warning => info!(
                        action,
                        balance = after,
                        "admission granted with balance below warning watermark"
                    ),
                    BalanceLevel::Safe => {
                        info!(action, cost = required, balance = after, "admission granted")
                    }
                }
                Ok(AdmissionDecision::granted(after, required))
            }
            ConsumeOutcome::Unknown => {
                // Logged distinctly from plain insufficiency: signal loss
                // and genuine exhaustion need different operator responses.
                warn!(action, "admission denied: balance signal unknown");
                self.record_rejection(action, 0, required, required, DenialReason::UnknownBalance);
                Ok(AdmissionDecision::unknown_balance(
                    required,
                    self.budget.unknown_retry(),
                ))
            }
            ConsumeOutcome::Insufficient { balance } => {
                let deficit = required - balance;
                info!(
                    action,
                    balance, required, deficit, "admission denied: insufficient budget"
                );
                self.record_rejection(
                    action,
                    balance,
                    required,
                    deficit,
                    DenialReason::InsufficientBudget,
                );
                Ok(AdmissionDecision::insufficient(
                    balance,
                    required,
                    Some(self.budget.retry_after(deficit)),
                ))
            }
        }
    }

    /// The recorded deficit mirrors the decision payload: 0 for a
    /// circuit-open denial, where no balance comparison happened.
    fn record_rejection(
        &self,
        action: &str,
        balance: u64,
        required: u64,
        deficit: u64,
        reason: DenialReason,
    ) {
        self.consumption.record_rejection(RejectionRecord {
            action: action.to_string(),
            balance,
            required,
            deficit,
            reason,
            at: Utc::now(),
        });
    }
}

// ── Tollgate ─────────────────────────────────────────────────────────────

/// The fully wired guard layer.
///
/// Owns every component as an injectable service object; consumers hold a
/// `Tollgate` (usually in an `Arc`) and call it at the top of each handler
/// or batch step, so the guarded action name is visible at the call site.
pub struct Tollgate {
    registry: Arc<ActionCostRegistry>,
    budget: Arc<BudgetTracker>,
    breaker: Arc<CircuitBreaker>,
    consumption: Arc<ConsumptionTracker>,
    estimator: CostEstimator,
    validator: JobValidator,
    gate: RemoteGate,
    guard: AdmissionGuard,
    job_deadline: Duration,
}

impl Tollgate {
    /// Build the guard layer from configuration and a balance source.
    ///
    /// Validates the configuration; action-wiring completeness is checked
    /// separately via [`validate_actions`] once the application knows its
    /// referenced action names, and the initial authoritative fetch happens
    /// in [`prime`].
    ///
    /// [`validate_actions`]: Tollgate::validate_actions
    /// [`prime`]: Tollgate::prime
    pub fn new(config: GuardConfig, source: Arc<dyn BalanceSource>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ActionCostRegistry::new(config.actions.clone()));
        let budget = Arc::new(BudgetTracker::new(config.budget.clone(), source));
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        let consumption = Arc::new(ConsumptionTracker::new());
        let guard = AdmissionGuard::new(
            Arc::clone(&registry),
            Arc::clone(&budget),
            Arc::clone(&breaker),
            Arc::clone(&consumption),
            config.budget.thresholds,
        );
        let gate = RemoteGate::new(&config.remote, Arc::clone(&breaker));

        Ok(Self {
            registry,
            budget,
            breaker,
            consumption,
            estimator: CostEstimator::new(config.jobs.safety_margin_pct),
            validator: JobValidator::new(&config.jobs),
            gate,
            guard,
            job_deadline: config.jobs.deadline(),
        })
    }

    /// Override the composite-job deadline (builder pattern).
    pub fn with_job_deadline(mut self, deadline: Duration) -> Self {
        self.job_deadline = deadline;
        self
    }

    /// Startup completeness check for every action name the application
    /// wires. Must pass before the service accepts traffic.
    pub fn validate_actions(&self, referenced: &[&str]) -> Result<()> {
        self.registry.validate(referenced)
    }

    /// Perform the initial authoritative balance fetch.
    ///
    /// A transport failure is logged, not escalated: the guard simply keeps
    /// denying conservatively until a refresh succeeds.
    pub async fn prime(&self) -> BalanceReading {
        let reading = self.budget.refresh().await;
        match reading {
            BalanceReading::Known(balance) => {
                info!(balance, "guard primed with authoritative balance")
            }
            BalanceReading::Unknown => {
                warn!("guard primed without a balance signal, admissions will be denied")
            }
        }
        reading
    }

    /// Admission decision for a single action. See [`AdmissionGuard::admit`].
    pub async fn admit(&self, action: &str) -> Result<AdmissionDecision> {
        self.guard.admit(action).await
    }

    /// Predict a composite job's total cost. Pure; never touches the
    /// budget.
    pub fn estimate(&self, job: &JobDescription) -> JobCostEstimate {
        self.estimator.estimate(job)
    }

    /// Pre-flight validation of a job estimate against the configured caps
    /// and the live balance. An unknown balance is treated as 0,
    /// conservatively.
    pub async fn validate_job(&self, estimate: &JobCostEstimate) -> ValidationResult {
        let balance = match self.budget.check_balance().await {
            BalanceReading::Known(balance) => balance,
            BalanceReading::Unknown => 0,
        };
        self.validator.validate(estimate, balance)
    }

    /// Run a composite job under the configured deadline. The job receives
    /// a cancellation token to observe between sub-steps.
    pub async fn run_job<F, Fut, T>(&self, operation: &str, job: F) -> Result<T>
    where
        F: FnOnce(tokio_util::sync::CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        run_with_deadline(operation, self.job_deadline, job).await
    }

    /// Execute a remote call under the in-flight cap and circuit breaker.
    /// See [`RemoteGate::call`].
    pub async fn guarded_call<F, Fut, T>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.gate.call(operation, call).await
    }

    // ── Component access ────────────────────────────────────────────

    /// The consumption log, for observability endpoints.
    pub fn consumption(&self) -> &ConsumptionTracker {
        &self.consumption
    }

    /// The budget tracker, for reconciling out-of-band balance signals.
    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }

    /// Current circuit state, for health endpoints.
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// The action cost registry.
    pub fn registry(&self) -> &ActionCostRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for Tollgate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tollgate")
            .field("actions", &self.registry.len())
            .field("circuit", &self.breaker.state())
            .field("job_deadline", &self.job_deadline)
            .finish()
    }
}
