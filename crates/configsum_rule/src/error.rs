//! Error types for rule construction and evaluation.

use thiserror::Error;

/// Errors that can occur while building or running a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Rule violates a construction or update invariant.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// A criteria matcher received a context value of the wrong type.
    #[error("rule '{rule}': invalid type to match on {field}: {source}")]
    InvalidTypeToMatch {
        /// Name of the rule being evaluated.
        rule: String,
        /// Context field the matcher was applied to.
        field: &'static str,
        /// The underlying matcher failure.
        #[source]
        source: MatchError,
    },

    /// The rule's criteria did not match the context.
    #[error("rule '{rule}' does not match on {field}")]
    NoMatch {
        /// Name of the rule being evaluated.
        rule: String,
        /// First context field that failed to match.
        field: &'static str,
    },

    /// The user's dice roll is above the rule's rollout threshold.
    #[error("rule '{rule}' not in rollout: rolled {roll}, rollout {rollout}")]
    RuleNotInRollout {
        /// Name of the rule being evaluated.
        rule: String,
        /// The roll that decided the outcome.
        roll: u8,
        /// The rule's rollout threshold.
        rollout: u8,
        /// Rolls to persist so the outcome stays sticky.
        decisions: Vec<u8>,
    },

    /// Experiment rules are not evaluated yet.
    #[error("rule '{rule}': experiment based rules not implemented")]
    ExperimentNotImplemented {
        /// Name of the rule being evaluated.
        rule: String,
    },

    /// A parameter on the wire declares a type its value does not have, or
    /// repeats a name.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Creates an invalid rule error with the given reason.
    pub fn invalid_rule(reason: impl Into<String>) -> Self {
        Self::InvalidRule(reason.into())
    }

    /// Returns true for outcomes that mean "the rule did not apply".
    ///
    /// These are not faults: a fold skips the rule and continues.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::NoMatch { .. } | Self::RuleNotInRollout { .. })
    }

    /// Returns true if this is a matcher type mismatch.
    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::InvalidTypeToMatch { .. })
    }

    /// Returns the rolls carried by a [`Error::RuleNotInRollout`].
    #[must_use]
    pub fn decisions(&self) -> Option<&[u8]> {
        match self {
            Self::RuleNotInRollout { decisions, .. } => Some(decisions),
            _ => None,
        }
    }
}

/// A matcher was handed a value of a type it cannot compare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct MatchError {
    /// Type the matcher compares against.
    pub expected: &'static str,
    /// Type of the supplied value.
    pub found: &'static str,
}

/// Result type alias for rule operations.
pub type Result<T> = std::result::Result<T, Error>;
