//! Error types for repository operations.

use thiserror::Error;

/// Errors that can occur in a repository.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// An entity with the same identity already exists.
    #[error("entity exists: {0}")]
    Exists(String),

    /// No rules are stored for the config id.
    #[error("no rule for id: {0}")]
    NoRuleForId(String),

    /// No rule with the name exists in the config.
    #[error("no rule with name: {0}")]
    NoRuleWithName(String),

    /// A conditional write was refused; carries the reason.
    #[error("update rejected: {0}")]
    Rejected(String),

    /// No sequence numbers are left for new records.
    #[error("user config sequence exhausted")]
    SequenceExhausted,

    /// A repository lock was poisoned by a panicking writer.
    #[error("repository lock poisoned: {0}")]
    Lock(&'static str),

    /// Unknown or unsupported fixture format.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// Stored rule is invalid.
    #[error(transparent)]
    Rule(#[from] configsum_rule::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns true if this is a [`Error::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;
