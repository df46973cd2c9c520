//! The rule entity.
//!
//! A rule overrides parameters of a base config for users matching its
//! criteria. Rules are only constructed through [`RuleBuilder`], which
//! enforces the invariants every stored rule must satisfy.

use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::params::Parameters;
use chrono::{DateTime, Utc};

/// Highest allowed rollout percentage.
pub const MAX_ROLLOUT: u8 = 100;

/// What a rule does when evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Always applies its single bucket.
    Override,
    /// Splits traffic across several buckets.
    Experiment,
    /// Applies its single bucket to a sticky percentage of users.
    Rollout,
}

impl Kind {
    /// Returns the wire code of this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Override => 1,
            Self::Experiment => 2,
            Self::Rollout => 3,
        }
    }

    /// Returns a lowercase name for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Experiment => "experiment",
            Self::Rollout => "rollout",
        }
    }
}

impl TryFrom<u8> for Kind {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Override),
            2 => Ok(Self::Experiment),
            3 => Ok(Self::Rollout),
            0 => Err(Error::invalid_rule("missing kind")),
            other => Err(Error::invalid_rule(format!("unknown kind {other}"))),
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One variant of parameters a rule can apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Parameters applied when this bucket is chosen.
    pub parameters: Parameters,
    /// Share of traffic for experiment rules.
    pub percentage: u8,
}

impl Bucket {
    /// Creates a bucket with a zero percentage.
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
            percentage: 0,
        }
    }

    /// Sets the traffic share.
    #[must_use]
    pub const fn with_percentage(mut self, percentage: u8) -> Self {
        self.percentage = percentage;
        self
    }
}

/// A validated override rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub(crate) id: String,
    pub(crate) config_id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) kind: Kind,
    pub(crate) criteria: Option<Criteria>,
    pub(crate) buckets: Vec<Bucket>,
    pub(crate) rollout: u8,
    pub(crate) active: bool,
    pub(crate) activated_at: Option<DateTime<Utc>>,
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) deleted: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Builder for [`Rule`].
#[derive(Debug, Clone)]
#[must_use]
pub struct RuleBuilder {
    rule: Rule,
}

/// Replacement state for [`Rule::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuleUpdate {
    /// New description.
    pub description: String,
    /// New kind.
    pub kind: Kind,
    /// New criteria.
    pub criteria: Option<Criteria>,
    /// New buckets.
    pub buckets: Vec<Bucket>,
    /// New rollout percentage.
    pub rollout: u8,
    /// New validity start.
    pub start_time: Option<DateTime<Utc>>,
    /// New validity end.
    pub end_time: Option<DateTime<Utc>>,
}

impl RuleBuilder {
    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = description.into();
        self
    }

    /// Sets the targeting criteria.
    pub fn criteria(mut self, criteria: Criteria) -> Self {
        self.rule.criteria = Some(criteria);
        self
    }

    /// Appends a bucket.
    pub fn bucket(mut self, bucket: Bucket) -> Self {
        self.rule.buckets.push(bucket);
        self
    }

    /// Replaces all buckets.
    pub fn buckets(mut self, buckets: Vec<Bucket>) -> Self {
        self.rule.buckets = buckets;
        self
    }

    /// Sets the rollout percentage.
    pub const fn rollout(mut self, rollout: u8) -> Self {
        self.rule.rollout = rollout;
        self
    }

    /// Sets the activation state.
    pub const fn active(mut self, active: bool) -> Self {
        self.rule.active = active;
        self
    }

    /// Sets the validity window. `None` leaves that end unbounded.
    pub const fn window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.rule.start_time = start;
        self.rule.end_time = end;
        self
    }

    /// Overrides the creation timestamp.
    pub const fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.rule.created_at = at;
        self.rule.updated_at = at;
        self
    }

    /// Validates and returns the rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] if any invariant is violated.
    pub fn build(self) -> Result<Rule> {
        let mut rule = self.rule;
        if rule.active && rule.activated_at.is_none() {
            rule.activated_at = Some(rule.created_at);
        }
        rule.validate()?;
        Ok(rule)
    }
}

impl Rule {
    /// Starts building a rule, stamped with the current time.
    pub fn builder(
        id: impl Into<String>,
        config_id: impl Into<String>,
        name: impl Into<String>,
        kind: Kind,
    ) -> RuleBuilder {
        let now = Utc::now();
        RuleBuilder {
            rule: Self {
                id: id.into(),
                config_id: config_id.into(),
                name: name.into(),
                description: String::new(),
                kind,
                criteria: None,
                buckets: Vec::new(),
                rollout: 0,
                active: false,
                activated_at: None,
                start_time: None,
                end_time: None,
                deleted: false,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Checks the rule invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] naming the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.buckets.is_empty() {
            return Err(Error::invalid_rule("missing buckets"));
        }

        if self.config_id.is_empty() {
            return Err(Error::invalid_rule("missing config id"));
        }

        if self.id.is_empty() {
            return Err(Error::invalid_rule("missing id"));
        }

        if self.name.is_empty() {
            return Err(Error::invalid_rule("missing name"));
        }

        if self.rollout > MAX_ROLLOUT {
            return Err(Error::invalid_rule(format!(
                "rollout percentage too high: {}",
                self.rollout
            )));
        }

        if self.buckets.len() > 1 {
            let total: u32 = self.buckets.iter().map(|b| u32::from(b.percentage)).sum();
            if total != 100 {
                return Err(Error::invalid_rule(format!(
                    "bucket percentages sum to {total}, expected 100"
                )));
            }
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(Error::invalid_rule("end time before start time"));
            }
        }

        Ok(())
    }

    /// Returns the rule id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the owning config id.
    #[must_use]
    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    /// Returns the rule name, unique within its config.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns the targeting criteria, if any.
    #[must_use]
    pub const fn criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    /// Returns the buckets.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Returns the rollout percentage.
    #[must_use]
    pub const fn rollout(&self) -> u8 {
        self.rollout
    }

    /// Returns true if the rule is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns when the rule was last activated.
    #[must_use]
    pub const fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    /// Returns the start of the validity window.
    #[must_use]
    pub const fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Returns the end of the validity window.
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Returns true if the rule was soft deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns the creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update time.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if `as_of` lies inside the validity window.
    #[must_use]
    pub fn in_window(&self, as_of: DateTime<Utc>) -> bool {
        self.start_time.map_or(true, |start| start <= as_of)
            && self.end_time.map_or(true, |end| as_of <= end)
    }

    /// Returns true if the rule should be evaluated at `as_of`.
    #[must_use]
    pub fn is_live(&self, as_of: DateTime<Utc>) -> bool {
        self.active && !self.deleted && self.in_window(as_of)
    }

    /// Activates the rule. Returns false if it was already active.
    pub fn activate(&mut self, at: DateTime<Utc>) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.activated_at = Some(at);
        self.updated_at = at;
        true
    }

    /// Deactivates the rule. Returns false if it was already inactive.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.updated_at = Utc::now();
        true
    }

    /// Changes the rollout percentage. Returns false if unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] if the percentage is above 100.
    pub fn set_rollout(&mut self, rollout: u8) -> Result<bool> {
        if self.rollout == rollout {
            return Ok(false);
        }
        if rollout > MAX_ROLLOUT {
            return Err(Error::invalid_rule(format!(
                "rollout percentage too high: {rollout}"
            )));
        }
        self.rollout = rollout;
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Soft deletes the rule. History referencing its name stays resolvable.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// Replaces the mutable state of the rule.
    ///
    /// The replacement is validated first; on failure the rule is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] if the updated rule would be invalid.
    pub fn update(&mut self, update: RuleUpdate) -> Result<()> {
        let mut candidate = self.clone();
        candidate.description = update.description;
        candidate.kind = update.kind;
        candidate.criteria = update.criteria;
        candidate.buckets = update.buckets;
        candidate.rollout = update.rollout;
        candidate.start_time = update.start_time;
        candidate.end_time = update.end_time;
        candidate.validate()?;

        candidate.updated_at = Utc::now();
        *self = candidate;
        Ok(())
    }
}
