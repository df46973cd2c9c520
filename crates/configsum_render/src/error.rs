//! Error types for service operations.

use thiserror::Error;

/// Errors that can occur in a service.
#[derive(Debug, Error)]
pub enum Error {
    /// Repository error, passed through unmodified.
    #[error(transparent)]
    Store(#[from] configsum_store::Error),

    /// Rule or engine error, passed through unmodified.
    #[error(transparent)]
    Rule(#[from] configsum_rule::Error),

    /// New base parameters drop a key or change a value's type.
    #[error("parameters invalid: {0}")]
    ParametersInvalid(String),

    /// A service lock was poisoned by a panicking holder.
    #[error("service lock poisoned: {0}")]
    Lock(&'static str),
}

impl Error {
    /// Returns true if a repository could not find the entity.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_pass_through() {
        let err = Error::from(configsum_store::Error::NotFound("base config 'x'".to_string()));

        assert!(err.is_not_found());
        insta::assert_snapshot!(err.to_string(), @"entity not found: base config 'x'");
    }

    #[test]
    fn parameters_invalid_message() {
        let err = Error::ParametersInvalid("missing key 'feature_x'".to_string());

        assert!(!err.is_not_found());
        insta::assert_snapshot!(err.to_string(), @"parameters invalid: missing key 'feature_x'");
    }
}
