//! Configuration schema types.
//!
//! All structs support both `snake_case` and `camelCase` field names in JSON
//! via `#[serde(alias)]`. Unknown fields are silently ignored for forward
//! compatibility. Durations are configured as integer `*_seconds` / `*_ms`
//! fields.
//!
//! [`GuardConfig::validate`] is the startup self-check: it must pass before
//! the consuming service accepts traffic, so that wiring mistakes fail
//! loudly at boot instead of per request.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TollgateError};

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for the tollgate guard layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GuardConfig {
    /// Budget tracking and refresh settings.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Circuit breaker settings for the downstream API.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Composite-job caps and deadline settings.
    #[serde(default)]
    pub jobs: JobLimitsConfig,

    /// Remote-call concurrency settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Fixed cost per action name. Every action the application wires must
    /// appear here; the table is configuration data, not code.
    #[serde(default)]
    pub actions: HashMap<String, u64>,
}

impl GuardConfig {
    /// Validate the configuration at startup.
    ///
    /// Checks structural invariants the serde layer cannot express:
    /// threshold ordering, non-zero gate parameters, a sane safety margin.
    /// Action-name completeness against the call sites is checked separately
    /// by the registry, which knows the referenced names.
    pub fn validate(&self) -> Result<()> {
        let t = &self.budget.thresholds;
        if !(t.critical <= t.warning && t.warning <= t.safe) {
            return Err(TollgateError::ConfigInvalid {
                reason: format!(
                    "balance thresholds must be ordered critical <= warning <= safe, got {}/{}/{}",
                    t.critical, t.warning, t.safe
                ),
            });
        }
        if self.breaker.failure_threshold == 0 {
            return Err(TollgateError::ConfigInvalid {
                reason: "breaker.failure_threshold must be at least 1".into(),
            });
        }
        if self.remote.max_in_flight == 0 {
            return Err(TollgateError::ConfigInvalid {
                reason: "remote.max_in_flight must be at least 1".into(),
            });
        }
        if self.jobs.deadline_seconds == 0 {
            return Err(TollgateError::ConfigInvalid {
                reason: "jobs.deadline_seconds must be at least 1".into(),
            });
        }
        if self.jobs.safety_margin_pct > 100 {
            return Err(TollgateError::ConfigInvalid {
                reason: format!(
                    "jobs.safety_margin_pct of {} exceeds 100",
                    self.jobs.safety_margin_pct
                ),
            });
        }
        Ok(())
    }
}

// ── Budget ───────────────────────────────────────────────────────────────

/// Budget tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Cache window before the balance is re-queried from the authoritative
    /// source, in seconds.
    #[serde(default = "default_refresh_ttl_seconds", alias = "refreshTtlSeconds")]
    pub refresh_ttl_seconds: u64,

    /// Units the downstream provider refills per minute. Used only to
    /// compute retry-after hints, never to fabricate balance. 0 = no
    /// modelled refill (hints fall back to the refresh TTL).
    #[serde(default, alias = "refillPerMinute")]
    pub refill_per_minute: u64,

    /// Suggested wait when the balance signal is absent, in seconds.
    #[serde(default = "default_unknown_retry_seconds", alias = "unknownRetrySeconds")]
    pub unknown_retry_seconds: u64,

    /// Advisory balance watermarks.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

fn default_refresh_ttl_seconds() -> u64 {
    60
}
fn default_unknown_retry_seconds() -> u64 {
    5
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            refresh_ttl_seconds: default_refresh_ttl_seconds(),
            refill_per_minute: 0,
            unknown_retry_seconds: default_unknown_retry_seconds(),
            thresholds: ThresholdsConfig::default(),
        }
    }
}

impl BudgetConfig {
    /// The refresh TTL as a [`Duration`].
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_seconds)
    }

    /// The unknown-signal retry hint as a [`Duration`].
    pub fn unknown_retry(&self) -> Duration {
        Duration::from_secs(self.unknown_retry_seconds)
    }
}

// ── Thresholds ───────────────────────────────────────────────────────────

/// Advisory balance watermarks.
///
/// Used only for logging and alerting. The allow/deny decision is strictly
/// `balance >= required` and never consults these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// At or below this balance the service is close to exhaustion.
    #[serde(default = "default_critical")]
    pub critical: u64,

    /// At or below this balance operators should be warned.
    #[serde(default = "default_warning")]
    pub warning: u64,

    /// At or above this balance no advisory fires.
    #[serde(default = "default_safe")]
    pub safe: u64,
}

fn default_critical() -> u64 {
    50
}
fn default_warning() -> u64 {
    200
}
fn default_safe() -> u64 {
    1000
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            warning: default_warning(),
            safe: default_safe(),
        }
    }
}

impl ThresholdsConfig {
    /// Classify a balance against the watermarks.
    pub fn classify(&self, balance: u64) -> BalanceLevel {
        if balance <= self.critical {
            BalanceLevel::Critical
        } else if balance <= self.warning {
            BalanceLevel::Warning
        } else {
            BalanceLevel::Safe
        }
    }
}

/// Advisory classification of a balance against [`ThresholdsConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceLevel {
    /// Balance at or below the critical watermark.
    Critical,
    /// Balance at or below the warning watermark.
    Warning,
    /// Balance above the warning watermark.
    Safe,
}

// ── Breaker ──────────────────────────────────────────────────────────────

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the circuit open.
    #[serde(default = "default_failure_threshold", alias = "failureThreshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed, in
    /// seconds.
    #[serde(default = "default_cooldown_seconds", alias = "cooldownSeconds")]
    pub cooldown_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_cooldown_seconds() -> u64 {
    60
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

impl BreakerConfig {
    /// The cooldown as a [`Duration`].
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────────

/// Composite-job caps and deadline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLimitsConfig {
    /// Hard cap on a single job's margin-adjusted estimate, independent of
    /// the current balance.
    #[serde(default = "default_max_cost_per_job", alias = "maxCostPerJob")]
    pub max_cost_per_job: u64,

    /// Balance floor that must remain after a job completes, protecting
    /// other concurrent consumers.
    #[serde(default = "default_min_reserve", alias = "minReserve")]
    pub min_reserve: u64,

    /// Percentage buffer added to job estimates to absorb undercounting.
    #[serde(default = "default_safety_margin_pct", alias = "safetyMarginPct")]
    pub safety_margin_pct: u64,

    /// Deadline for a composite job, in seconds.
    #[serde(default = "default_deadline_seconds", alias = "deadlineSeconds")]
    pub deadline_seconds: u64,
}

fn default_max_cost_per_job() -> u64 {
    500
}
fn default_min_reserve() -> u64 {
    50
}
fn default_safety_margin_pct() -> u64 {
    15
}
fn default_deadline_seconds() -> u64 {
    300
}

impl Default for JobLimitsConfig {
    fn default() -> Self {
        Self {
            max_cost_per_job: default_max_cost_per_job(),
            min_reserve: default_min_reserve(),
            safety_margin_pct: default_safety_margin_pct(),
            deadline_seconds: default_deadline_seconds(),
        }
    }
}

impl JobLimitsConfig {
    /// The job deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }
}

// ── Remote ───────────────────────────────────────────────────────────────

/// Remote-call concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Maximum simultaneous in-flight calls to the downstream API. Callers
    /// beyond the limit queue FIFO rather than failing.
    #[serde(default = "default_max_in_flight", alias = "maxInFlight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    3
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GuardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.budget.refresh_ttl_seconds, 60);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.remote.max_in_flight, 3);
        assert_eq!(config.jobs.safety_margin_pct, 15);
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: GuardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.budget.refresh_ttl_seconds, 60);
        assert!(config.actions.is_empty());
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let json = r#"{
            "budget": {"refreshTtlSeconds": 30, "refillPerMinute": 10},
            "breaker": {"failureThreshold": 3, "cooldownSeconds": 15},
            "jobs": {"maxCostPerJob": 200, "minReserve": 25},
            "remote": {"maxInFlight": 5}
        }"#;
        let config: GuardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.budget.refresh_ttl_seconds, 30);
        assert_eq!(config.budget.refill_per_minute, 10);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.jobs.max_cost_per_job, 200);
        assert_eq!(config.remote.max_in_flight, 5);
    }

    #[test]
    fn action_table_deserializes() {
        let json = r#"{"actions": {"refresh_listing": 50, "item_lookup": 5}}"#;
        let config: GuardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.actions.get("refresh_listing"), Some(&50));
        assert_eq!(config.actions.get("item_lookup"), Some(&5));
    }

    #[test]
    fn misordered_thresholds_rejected() {
        let mut config = GuardConfig::default();
        config.budget.thresholds = ThresholdsConfig {
            critical: 500,
            warning: 200,
            safe: 1000,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds"));
    }

    #[test]
    fn zero_failure_threshold_rejected() {
        let mut config = GuardConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_in_flight_rejected() {
        let mut config = GuardConfig::default();
        config.remote.max_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_safety_margin_rejected() {
        let mut config = GuardConfig::default();
        config.jobs.safety_margin_pct = 150;
        assert!(config.validate().is_err());
    }

    #[test]
    fn thresholds_classify_levels() {
        let t = ThresholdsConfig {
            critical: 50,
            warning: 200,
            safe: 1000,
        };
        assert_eq!(t.classify(0), BalanceLevel::Critical);
        assert_eq!(t.classify(50), BalanceLevel::Critical);
        assert_eq!(t.classify(51), BalanceLevel::Warning);
        assert_eq!(t.classify(200), BalanceLevel::Warning);
        assert_eq!(t.classify(201), BalanceLevel::Safe);
        assert_eq!(t.classify(5000), BalanceLevel::Safe);
    }

    #[test]
    fn duration_helpers() {
        let config = GuardConfig::default();
        assert_eq!(config.budget.refresh_ttl(), Duration::from_secs(60));
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(60));
        assert_eq!(config.jobs.deadline(), Duration::from_secs(300));
    }
}
