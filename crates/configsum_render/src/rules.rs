//! Rule lifecycle service.

use crate::error::Result;
use chrono::Utc;
use configsum_rule::{Rule, RuleUpdate};
use configsum_store::{BaseRepo, RuleRepo};
use std::sync::Arc;
use tracing::info;

/// Creates rules and drives them through their lifecycle.
///
/// Toggles that would not change anything skip the repository write.
#[derive(Clone)]
pub struct RuleService {
    rules: Arc<dyn RuleRepo>,
    bases: Arc<dyn BaseRepo>,
}

impl RuleService {
    /// Creates a service over the given repositories.
    #[must_use]
    pub fn new(rules: Arc<dyn RuleRepo>, bases: Arc<dyn BaseRepo>) -> Self {
        Self { rules, bases }
    }

    /// Stores a new rule after checking that its base config exists.
    ///
    /// # Errors
    ///
    /// Returns a not found error for an unknown config and an exists error
    /// for a duplicate id or name.
    pub fn create(&self, rule: Rule) -> Result<Rule> {
        self.bases.get_by_id(rule.config_id())?;
        let rule = self.rules.create(rule)?;

        info!(id = rule.id(), name = rule.name(), kind = %rule.kind(), "rule created");
        Ok(rule)
    }

    /// Returns the rule with the given id.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the rule does not exist or was deleted.
    pub fn get_by_id(&self, id: &str) -> Result<Rule> {
        Ok(self.rules.get_by_id(id)?)
    }

    /// Returns all non-deleted rules of a config in fold order.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn list(&self, config_id: &str) -> Result<Vec<Rule>> {
        Ok(self.rules.list_all(config_id)?)
    }

    /// Activates a rule.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the rule does not exist.
    pub fn activate(&self, id: &str) -> Result<Rule> {
        let mut rule = self.rules.get_by_id(id)?;
        if !rule.activate(Utc::now()) {
            return Ok(rule);
        }

        let rule = self.rules.update_with(rule)?;
        info!(id, name = rule.name(), "rule activated");
        Ok(rule)
    }

    /// Deactivates a rule.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the rule does not exist.
    pub fn deactivate(&self, id: &str) -> Result<Rule> {
        let mut rule = self.rules.get_by_id(id)?;
        if !rule.deactivate() {
            return Ok(rule);
        }

        let rule = self.rules.update_with(rule)?;
        info!(id, name = rule.name(), "rule deactivated");
        Ok(rule)
    }

    /// Changes the rollout percentage of a rule.
    ///
    /// Users with a recorded roll keep it; only users rendered afterwards
    /// see the new threshold applied to a fresh roll.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the rule does not exist and an invalid
    /// rule error if the percentage is above 100.
    pub fn update_rollout(&self, id: &str, rollout: u8) -> Result<Rule> {
        let mut rule = self.rules.get_by_id(id)?;
        if !rule.set_rollout(rollout)? {
            return Ok(rule);
        }

        let rule = self.rules.update_with(rule)?;
        info!(id, name = rule.name(), rollout, "rule rollout updated");
        Ok(rule)
    }

    /// Replaces the mutable state of a rule.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the rule does not exist and an invalid
    /// rule error if the update breaks a rule invariant.
    pub fn update(&self, id: &str, update: RuleUpdate) -> Result<Rule> {
        let mut rule = self.rules.get_by_id(id)?;
        rule.update(update)?;

        let rule = self.rules.update_with(rule)?;
        info!(id, name = rule.name(), "rule updated");
        Ok(rule)
    }

    /// Soft deletes a rule. Its name stays reserved within the config.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the rule does not exist or is already
    /// deleted.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut rule = self.rules.get_by_id(id)?;
        rule.mark_deleted();

        self.rules.update_with(rule)?;
        info!(id, "rule deleted");
        Ok(())
    }
}
