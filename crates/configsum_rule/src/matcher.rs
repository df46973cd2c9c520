//! Typed comparison primitives used inside criteria.
//!
//! A matcher is one of a closed set of variants, each comparing a single
//! context value against a fixed expectation. On the wire the variant is
//! recognised by shape:
//! - `true` (boolean equality)
//! - `{"comparator": "gt", "value": 1}` (integer comparison)
//! - `"en-GB"` (string equality)
//! - `["a", "b"]` (string set membership)

use crate::error::MatchError;
use serde::{Deserialize, Serialize};

/// A single typed comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Matcher {
    /// Matches a boolean on exact equality.
    Bool(bool),
    /// Compares an integer against a threshold.
    Int(IntMatcher),
    /// Matches a string on exact equality.
    String(String),
    /// Matches a string contained in the set.
    StringSet(Vec<String>),
}

/// Integer comparison against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntMatcher {
    /// How the input is compared.
    pub comparator: Comparator,
    /// The threshold.
    pub value: i64,
}

/// Integer comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// Input is strictly greater than the threshold.
    Gt,
}

/// A context value handed to a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchValue<'a> {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// String value.
    Str(&'a str),
}

impl MatchValue<'_> {
    const fn type_name(self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
        }
    }
}

impl Matcher {
    /// Creates a greater-than integer matcher.
    #[must_use]
    pub const fn greater_than(value: i64) -> Self {
        Self::Int(IntMatcher {
            comparator: Comparator::Gt,
            value,
        })
    }

    /// Creates a string set matcher.
    #[must_use]
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringSet(values.into_iter().map(Into::into).collect())
    }

    /// Creates a string equality matcher.
    #[must_use]
    pub fn equals(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Returns the type of value this matcher compares.
    #[must_use]
    pub const fn expects(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) | Self::StringSet(_) => "string",
        }
    }

    /// Matches a value against this matcher.
    ///
    /// # Errors
    ///
    /// Returns a [`MatchError`] if the value's type is not the one this
    /// matcher compares. Values are never coerced.
    pub fn matches(&self, value: MatchValue<'_>) -> Result<bool, MatchError> {
        match (self, value) {
            (Self::Bool(expected), MatchValue::Bool(input)) => Ok(*expected == input),
            (Self::Int(int), MatchValue::Int(input)) => Ok(int.compare(input)),
            (Self::String(expected), MatchValue::Str(input)) => Ok(expected == input),
            (Self::StringSet(set), MatchValue::Str(input)) => {
                Ok(set.iter().any(|candidate| candidate == input))
            }
            _ => Err(MatchError {
                expected: self.expects(),
                found: value.type_name(),
            }),
        }
    }
}

impl IntMatcher {
    const fn compare(self, input: i64) -> bool {
        match self.comparator {
            Comparator::Gt => input > self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_equality() {
        let matcher = Matcher::Bool(true);
        assert!(matcher.matches(MatchValue::Bool(true)).unwrap());
        assert!(!matcher.matches(MatchValue::Bool(false)).unwrap());
    }

    #[test]
    fn int_greater_than() {
        let matcher = Matcher::greater_than(1);
        assert!(matcher.matches(MatchValue::Int(2)).unwrap());
        assert!(!matcher.matches(MatchValue::Int(1)).unwrap());
        assert!(!matcher.matches(MatchValue::Int(-4)).unwrap());
    }

    #[test]
    fn string_equality() {
        let matcher = Matcher::equals("en-GB");
        assert!(matcher.matches(MatchValue::Str("en-GB")).unwrap());
        assert!(!matcher.matches(MatchValue::Str("en-US")).unwrap());
    }

    #[test]
    fn string_set_membership() {
        let matcher = Matcher::one_of(["abc", "def"]);
        assert!(matcher.matches(MatchValue::Str("abc")).unwrap());
        assert!(matcher.matches(MatchValue::Str("def")).unwrap());
        assert!(!matcher.matches(MatchValue::Str("xyz")).unwrap());
    }

    #[test]
    fn string_into_int_matcher_is_type_error() {
        let err = Matcher::greater_than(3)
            .matches(MatchValue::Str("4"))
            .unwrap_err();
        assert_eq!(
            err,
            MatchError {
                expected: "int",
                found: "string",
            }
        );
    }

    #[test]
    fn int_into_string_set_is_type_error() {
        let result = Matcher::one_of(["1"]).matches(MatchValue::Int(1));
        assert!(result.is_err());
    }

    #[test]
    fn wire_shapes() {
        let decoded: Vec<Matcher> = serde_json::from_str(
            r#"[true, {"comparator":"gt","value":2}, "en-GB", ["a","b"]]"#,
        )
        .unwrap();

        assert_eq!(
            decoded,
            vec![
                Matcher::Bool(true),
                Matcher::greater_than(2),
                Matcher::equals("en-GB"),
                Matcher::one_of(["a", "b"]),
            ]
        );

        let encoded = serde_json::to_string(&Matcher::greater_than(2)).unwrap();
        assert_eq!(encoded, r#"{"comparator":"gt","value":2}"#);
    }
}
