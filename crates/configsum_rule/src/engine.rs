//! Decision engine.
//!
//! [`Rule::run`] applies one rule for one user; [`fold`] applies an ordered
//! list of rules on top of base parameters. Both are pure functions of their
//! arguments: all randomness comes from the injected [`PercentageSource`],
//! and a recorded roll is always replayed instead of drawing a new one.

use crate::context::Context;
use crate::criteria::Verdict;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::percentage::PercentageSource;
use crate::rule::{Kind, Rule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Recorded rolls per rule name for one user.
pub type Decisions = BTreeMap<String, Vec<u8>>;

/// Result of applying one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Parameters after the rule was applied.
    pub parameters: Parameters,
    /// Rolls to persist for this rule. Empty when nothing was rolled.
    pub decisions: Vec<u8>,
}

/// Result of folding all rules of a config for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    /// Final parameters.
    pub parameters: Parameters,
    /// Rolls to persist, keyed by rule name.
    pub decisions: Decisions,
}

impl Rule {
    /// Applies this rule on top of `input` for the user in `ctx`.
    ///
    /// `history` holds the rolls previously recorded for this rule and user.
    /// If it is non-empty its first roll is reused and `source` is not
    /// touched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTypeToMatch`] if a criteria matcher got a value of
    ///   the wrong type
    /// - [`Error::NoMatch`] if the criteria did not match
    /// - [`Error::RuleNotInRollout`] if the roll is above the rollout; the
    ///   error carries the rolls to persist
    /// - [`Error::ExperimentNotImplemented`] for experiment rules
    pub fn run<S>(
        &self,
        input: &Parameters,
        ctx: &Context,
        history: &[u8],
        source: &mut S,
    ) -> Result<Evaluation>
    where
        S: PercentageSource + ?Sized,
    {
        if let Some(criteria) = &self.criteria {
            let verdict = criteria
                .evaluate(ctx)
                .map_err(|e| Error::InvalidTypeToMatch {
                    rule: self.name.clone(),
                    field: e.field,
                    source: e.source,
                })?;

            if let Verdict::Miss(field) = verdict {
                return Err(Error::NoMatch {
                    rule: self.name.clone(),
                    field,
                });
            }
        }

        match self.kind {
            Kind::Override => Ok(Evaluation {
                parameters: input.merged(&self.buckets[0].parameters),
                decisions: Vec::new(),
            }),
            Kind::Experiment => Err(Error::ExperimentNotImplemented {
                rule: self.name.clone(),
            }),
            Kind::Rollout => {
                let decisions = if history.is_empty() {
                    vec![source.roll()]
                } else {
                    history.to_vec()
                };
                let roll = decisions[0];

                if roll <= self.rollout {
                    Ok(Evaluation {
                        parameters: input.merged(&self.buckets[0].parameters),
                        decisions,
                    })
                } else {
                    Err(Error::RuleNotInRollout {
                        rule: self.name.clone(),
                        roll,
                        rollout: self.rollout,
                        decisions,
                    })
                }
            }
        }
    }
}

/// What [`fold_with`] does when a rule's criteria hit a value of the wrong
/// type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Abort the fold with [`Error::InvalidTypeToMatch`].
    #[default]
    Fail,
    /// Log the mismatch and skip the rule.
    Skip,
}

/// Applies `rules` in order on top of `base`.
///
/// Rules that do not apply (criteria miss, roll above rollout) leave the
/// parameters untouched; a lost roll is still recorded so it is replayed on
/// the next render. The returned decisions start from `history`, so rolls of
/// rules that were not evaluated this time (inactive, out of window, criteria
/// miss) are carried forward.
///
/// # Errors
///
/// Returns the first error that is not an expected outcome (see
/// [`Error::is_expected`]).
pub fn fold<'a, I, S>(
    rules: I,
    base: &Parameters,
    ctx: &Context,
    history: &Decisions,
    source: &mut S,
) -> Result<Rendered>
where
    I: IntoIterator<Item = &'a Rule>,
    S: PercentageSource + ?Sized,
{
    fold_with(MismatchPolicy::Fail, rules, base, ctx, history, source)
}

/// Like [`fold`], with an explicit policy for malformed criteria.
///
/// # Errors
///
/// Returns the first error that is not an expected outcome. Type mismatches
/// are only returned under [`MismatchPolicy::Fail`].
pub fn fold_with<'a, I, S>(
    policy: MismatchPolicy,
    rules: I,
    base: &Parameters,
    ctx: &Context,
    history: &Decisions,
    source: &mut S,
) -> Result<Rendered>
where
    I: IntoIterator<Item = &'a Rule>,
    S: PercentageSource + ?Sized,
{
    let mut rendered = Rendered {
        parameters: base.clone(),
        decisions: history.clone(),
    };

    for rule in rules {
        let recorded = history.get(rule.name()).map_or(&[][..], Vec::as_slice);

        match rule.run(&rendered.parameters, ctx, recorded, source) {
            Ok(evaluation) => {
                debug!(rule = rule.name(), kind = %rule.kind(), "rule applied");
                rendered.parameters = evaluation.parameters;
                if !evaluation.decisions.is_empty() {
                    rendered
                        .decisions
                        .insert(rule.name().to_string(), evaluation.decisions);
                }
            }
            Err(Error::RuleNotInRollout {
                roll,
                rollout,
                decisions,
                ..
            }) => {
                debug!(rule = rule.name(), roll, rollout, "rule not in rollout");
                rendered.decisions.insert(rule.name().to_string(), decisions);
            }
            Err(Error::NoMatch { field, .. }) => {
                debug!(rule = rule.name(), field, "rule criteria did not match");
            }
            Err(err) if err.is_type_mismatch() => {
                warn!(rule = rule.name(), error = %err, "rule criteria are malformed");
                if policy == MismatchPolicy::Fail {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }

    Ok(rendered)
}
