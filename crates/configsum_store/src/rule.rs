//! Rule repository.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use configsum_rule::Rule;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::debug;

/// Storage for rules.
///
/// Listing operations return rules in fold order: creation time ascending,
/// ties broken by id.
pub trait RuleRepo: Send + Sync {
    /// Stores a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exists`] if the id is taken or the name is already
    /// used within the rule's config.
    fn create(&self, rule: Rule) -> Result<Rule>;

    /// Returns the rule with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no live (non-deleted) rule has the id.
    fn get_by_id(&self, id: &str) -> Result<Rule>;

    /// Replaces the rule stored under the input's config and name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuleForId`] if the config has no rules,
    /// [`Error::NoRuleWithName`] if the name is unknown in the config and
    /// [`Error::Exists`] if the id belongs to another rule.
    fn update_with(&self, rule: Rule) -> Result<Rule>;

    /// Returns all non-deleted rules of a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_all(&self, config_id: &str) -> Result<Vec<Rule>>;

    /// Returns the rules of a config that are live at `as_of`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_active(&self, config_id: &str, as_of: DateTime<Utc>) -> Result<Vec<Rule>>;
}

#[derive(Debug, Default)]
struct RuleState {
    /// Rules per config id, keyed by name.
    configs: HashMap<String, BTreeMap<String, Rule>>,
    /// Rule id to (config id, name).
    ids: HashMap<String, (String, String)>,
}

/// In-memory [`RuleRepo`].
#[derive(Debug, Default)]
pub struct InMemoryRuleRepo {
    state: RwLock<RuleState>,
}

impl InMemoryRuleRepo {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<F>(&self, config_id: &str, keep: F) -> Result<Vec<Rule>>
    where
        F: Fn(&Rule) -> bool,
    {
        let state = self.state.read().map_err(|_| Error::Lock("rules"))?;
        let Some(rules) = state.configs.get(config_id) else {
            return Ok(Vec::new());
        };

        let mut out: Vec<Rule> = rules.values().filter(|r| keep(r)).cloned().collect();
        out.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(out)
    }
}

impl RuleRepo for InMemoryRuleRepo {
    fn create(&self, rule: Rule) -> Result<Rule> {
        let mut state = self.state.write().map_err(|_| Error::Lock("rules"))?;

        if state.ids.contains_key(rule.id()) {
            return Err(Error::Exists(format!("rule id '{}'", rule.id())));
        }

        let config = state.configs.entry(rule.config_id().to_string()).or_default();
        if config.contains_key(rule.name()) {
            return Err(Error::Exists(format!("rule name '{}'", rule.name())));
        }

        config.insert(rule.name().to_string(), rule.clone());
        state.ids.insert(
            rule.id().to_string(),
            (rule.config_id().to_string(), rule.name().to_string()),
        );

        debug!(id = rule.id(), config = rule.config_id(), "rule created");
        Ok(rule)
    }

    fn get_by_id(&self, id: &str) -> Result<Rule> {
        let state = self.state.read().map_err(|_| Error::Lock("rules"))?;

        state
            .ids
            .get(id)
            .and_then(|(config_id, name)| state.configs.get(config_id)?.get(name))
            .filter(|rule| !rule.is_deleted())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("rule '{id}'")))
    }

    fn update_with(&self, rule: Rule) -> Result<Rule> {
        let mut state = self.state.write().map_err(|_| Error::Lock("rules"))?;

        if let Some((config_id, name)) = state.ids.get(rule.id()) {
            if config_id != rule.config_id() || name != rule.name() {
                return Err(Error::Exists(format!("rule id '{}'", rule.id())));
            }
        }

        let config = state
            .configs
            .get_mut(rule.config_id())
            .ok_or_else(|| Error::NoRuleForId(rule.config_id().to_string()))?;
        let stored = config
            .get_mut(rule.name())
            .ok_or_else(|| Error::NoRuleWithName(rule.name().to_string()))?;

        let previous_id = stored.id().to_string();
        *stored = rule.clone();

        if previous_id != rule.id() {
            state.ids.remove(&previous_id);
            state.ids.insert(
                rule.id().to_string(),
                (rule.config_id().to_string(), rule.name().to_string()),
            );
        }

        debug!(id = rule.id(), config = rule.config_id(), "rule updated");
        Ok(rule)
    }

    fn list_all(&self, config_id: &str) -> Result<Vec<Rule>> {
        self.collect(config_id, |rule| !rule.is_deleted())
    }

    fn list_active(&self, config_id: &str, as_of: DateTime<Utc>) -> Result<Vec<Rule>> {
        self.collect(config_id, |rule| rule.is_live(as_of))
    }
}
