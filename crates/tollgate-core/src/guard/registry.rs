//! Action cost registry.
//!
//! Immutable mapping from action name to fixed budget cost, loaded from
//! configuration at startup. Referencing an unknown action is a wiring
//! error, not a runtime admission outcome: [`ActionCostRegistry::validate`]
//! runs as part of the startup self-check so a misnamed action fails before
//! the service accepts traffic.

use std::collections::HashMap;

use tollgate_types::error::{Result, TollgateError};

/// Static action-name -> fixed-cost table.
#[derive(Debug, Clone)]
pub struct ActionCostRegistry {
    costs: HashMap<String, u64>,
}

impl ActionCostRegistry {
    /// Build a registry from the configured action table.
    pub fn new(costs: HashMap<String, u64>) -> Self {
        Self { costs }
    }

    /// Fixed cost of an action.
    ///
    /// Unknown action names are a configuration error. Call sites should be
    /// covered by [`validate`] at startup so this never fires per request.
    ///
    /// [`validate`]: ActionCostRegistry::validate
    pub fn cost_of(&self, action: &str) -> Result<u64> {
        self.costs
            .get(action)
            .copied()
            .ok_or_else(|| TollgateError::UnknownAction {
                action: action.to_string(),
            })
    }

    /// Whether the action is registered.
    pub fn contains(&self, action: &str) -> bool {
        self.costs.contains_key(action)
    }

    /// Startup completeness check: every action name the application wires
    /// must exist in the table. Fails on the first missing name.
    pub fn validate(&self, referenced: &[&str]) -> Result<()> {
        for action in referenced {
            if !self.contains(action) {
                return Err(TollgateError::UnknownAction {
                    action: (*action).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> ActionCostRegistry {
        let mut costs = HashMap::new();
        costs.insert("refresh_listing".to_string(), 50);
        costs.insert("item_lookup".to_string(), 5);
        costs.insert("discovery_scan".to_string(), 50);
        ActionCostRegistry::new(costs)
    }

    #[test]
    fn cost_of_registered_action() {
        let registry = sample_registry();
        assert_eq!(registry.cost_of("refresh_listing").unwrap(), 50);
        assert_eq!(registry.cost_of("item_lookup").unwrap(), 5);
    }

    #[test]
    fn cost_of_unknown_action_errors() {
        let registry = sample_registry();
        let err = registry.cost_of("export_pdf").unwrap_err();
        assert!(matches!(err, TollgateError::UnknownAction { .. }));
        assert!(err.to_string().contains("export_pdf"));
    }

    #[test]
    fn validate_passes_on_complete_wiring() {
        let registry = sample_registry();
        assert!(registry
            .validate(&["refresh_listing", "item_lookup", "discovery_scan"])
            .is_ok());
    }

    #[test]
    fn validate_fails_on_missing_action() {
        let registry = sample_registry();
        let err = registry
            .validate(&["refresh_listing", "nightly_report"])
            .unwrap_err();
        assert!(matches!(
            err,
            TollgateError::UnknownAction { ref action } if action == "nightly_report"
        ));
    }

    #[test]
    fn validate_empty_reference_list() {
        let registry = ActionCostRegistry::new(HashMap::new());
        assert!(registry.is_empty());
        assert!(registry.validate(&[]).is_ok());
    }

    #[test]
    fn len_counts_entries() {
        assert_eq!(sample_registry().len(), 3);
    }
}
