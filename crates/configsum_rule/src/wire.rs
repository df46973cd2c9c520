//! JSON wire representation of rules.
//!
//! ```json
//! {
//!   "active": true,
//!   "activated_at": "2024-01-01T00:00:00.000000000Z",
//!   "buckets": [
//!     {"name": "default", "percentage": 0,
//!      "parameters": [{"name": "feature_x", "type": "bool", "value": true}]}
//!   ],
//!   "config_id": "base-1",
//!   "created_at": "2024-01-01T00:00:00.000000000Z",
//!   "criteria": {"user": {"id": ["abc"]}},
//!   "description": "",
//!   "deleted": false,
//!   "end_time": "0001-01-01T00:00:00Z",
//!   "id": "rule-1",
//!   "kind": 3,
//!   "name": "beta",
//!   "rollout": 30,
//!   "start_time": "0001-01-01T00:00:00Z",
//!   "updated_at": "2024-01-01T00:00:00.000000000Z"
//! }
//! ```
//!
//! `criteria` is omitted when absent. Unset times are written as the zero
//! instant and read back (zero instant or `null`) as unset.

use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::params::{ParameterValue, Parameters};
use crate::rule::{Bucket, Kind, Rule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized form of a [`Rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Activation state.
    #[serde(default)]
    pub active: bool,
    /// Last activation time.
    #[serde(default, with = "timestamp::optional")]
    pub activated_at: Option<DateTime<Utc>>,
    /// Parameter buckets.
    pub buckets: Vec<BucketDocument>,
    /// Owning config.
    pub config_id: String,
    /// Creation time; the zero instant means missing.
    #[serde(default, with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    /// Targeting criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Soft delete flag.
    #[serde(default)]
    pub deleted: bool,
    /// End of the validity window.
    #[serde(default, with = "timestamp::optional")]
    pub end_time: Option<DateTime<Utc>>,
    /// Rule id.
    pub id: String,
    /// Kind code: 1 override, 2 experiment, 3 rollout.
    pub kind: u8,
    /// Rule name.
    pub name: String,
    /// Rollout percentage.
    #[serde(default)]
    pub rollout: u8,
    /// Start of the validity window.
    #[serde(default, with = "timestamp::optional")]
    pub start_time: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, with = "timestamp::optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Serialized form of a [`Bucket`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDocument {
    /// Bucket name.
    #[serde(default)]
    pub name: String,
    /// Traffic share.
    #[serde(default)]
    pub percentage: u8,
    /// Self-describing parameters.
    #[serde(with = "tagged_parameters")]
    pub parameters: Parameters,
}

/// A parameter with its type spelled out for clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireParameter {
    /// Parameter key.
    pub name: String,
    /// One of `bool`, `number`, `string`, `number_list`, `string_list`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Parameter value.
    pub value: ParameterValue,
}

impl WireParameter {
    fn into_entry(self) -> Result<(String, ParameterValue)> {
        if self.kind == self.value.type_name() {
            return Ok((self.name, self.value));
        }

        // An empty list decodes as numbers regardless of its declared type.
        let value = match (self.kind.as_str(), self.value) {
            ("string_list", ParameterValue::Numbers(n)) if n.is_empty() => {
                ParameterValue::Strings(Vec::new())
            }
            (_, value) => {
                return Err(Error::InvalidParameter(format!(
                    "'{}' declared as {} but holds {}",
                    self.name,
                    self.kind,
                    value.type_name()
                )))
            }
        };

        Ok((self.name, value))
    }
}

impl From<Bucket> for BucketDocument {
    fn from(bucket: Bucket) -> Self {
        Self {
            name: bucket.name,
            percentage: bucket.percentage,
            parameters: bucket.parameters,
        }
    }
}

impl From<BucketDocument> for Bucket {
    fn from(doc: BucketDocument) -> Self {
        Self {
            name: doc.name,
            parameters: doc.parameters,
            percentage: doc.percentage,
        }
    }
}

impl From<Rule> for RuleDocument {
    fn from(rule: Rule) -> Self {
        Self {
            active: rule.active,
            activated_at: rule.activated_at,
            buckets: rule.buckets.into_iter().map(Into::into).collect(),
            config_id: rule.config_id,
            created_at: Some(rule.created_at),
            criteria: rule.criteria,
            description: rule.description,
            deleted: rule.deleted,
            end_time: rule.end_time,
            id: rule.id,
            kind: rule.kind.code(),
            name: rule.name,
            rollout: rule.rollout,
            start_time: rule.start_time,
            updated_at: Some(rule.updated_at),
        }
    }
}

impl TryFrom<RuleDocument> for Rule {
    type Error = Error;

    fn try_from(doc: RuleDocument) -> Result<Self> {
        let kind = Kind::try_from(doc.kind)?;
        let created_at = doc
            .created_at
            .ok_or_else(|| Error::invalid_rule("missing created at"))?;

        let rule = Self {
            id: doc.id,
            config_id: doc.config_id,
            name: doc.name,
            description: doc.description,
            kind,
            criteria: doc.criteria,
            buckets: doc.buckets.into_iter().map(Into::into).collect(),
            rollout: doc.rollout,
            active: doc.active,
            activated_at: doc.activated_at,
            start_time: doc.start_time,
            end_time: doc.end_time,
            deleted: doc.deleted,
            created_at,
            updated_at: doc.updated_at.unwrap_or(created_at),
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl Serialize for Rule {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RuleDocument::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let doc = RuleDocument::deserialize(deserializer)?;
        Self::try_from(doc).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for bucket parameters as `[{name, type, value}]`.
pub mod tagged_parameters {
    use super::{Parameters, WireParameter};
    use crate::error::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serializes parameters as a list sorted by name.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(params: &Parameters, serializer: S) -> Result<S::Ok, S::Error> {
        let list: Vec<WireParameter> = params
            .iter()
            .map(|(name, value)| WireParameter {
                name: name.clone(),
                kind: value.type_name().to_string(),
                value: value.clone(),
            })
            .collect();
        list.serialize(serializer)
    }

    /// Deserializes a parameter list, checking declared types.
    ///
    /// # Errors
    ///
    /// Fails if a declared type disagrees with its value or a name repeats.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Parameters, D::Error> {
        let list = Vec::<WireParameter>::deserialize(deserializer)?;
        let mut params = Parameters::new();
        for parameter in list {
            let (name, value) = parameter.into_entry().map_err(serde::de::Error::custom)?;
            if params.contains_key(&name) {
                let err = Error::InvalidParameter(format!("'{name}' is declared twice"));
                return Err(serde::de::Error::custom(err));
            }
            params.insert(name, value);
        }
        Ok(params)
    }
}

/// Serde helpers for RFC 3339 timestamps with nanosecond precision.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};

    /// The zero instant written for unset times.
    pub const ZERO: &str = "0001-01-01T00:00:00Z";

    const ZERO_SECONDS: i64 = -62_135_596_800;

    /// Formats a timestamp.
    #[must_use]
    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Parses a timestamp, mapping the zero instant to `None`.
    ///
    /// # Errors
    ///
    /// Returns the chrono parse error for malformed input.
    pub fn parse(raw: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
        let at = DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc);
        if at.timestamp() == ZERO_SECONDS && at.timestamp_subsec_nanos() == 0 {
            return Ok(None);
        }
        Ok(Some(at))
    }

    /// Optional timestamps.
    pub mod optional {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes `None` as the zero instant.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => serializer.serialize_str(&super::format(at)),
                None => serializer.serialize_str(super::ZERO),
            }
        }

        /// Deserializes a timestamp, `null` or the zero instant.
        ///
        /// # Errors
        ///
        /// Fails on malformed timestamps.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use chrono::TimeZone;

    fn sample_rule() -> Rule {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        Rule::builder("rule-1", "base-1", "beta", Kind::Rollout)
            .description("beta users")
            .criteria(Criteria::new().with_user_id(Matcher::one_of(["abc"])))
            .bucket(Bucket::new(
                "default",
                Parameters::from([
                    ("feature_x", ParameterValue::Bool(true)),
                    ("limit", ParameterValue::Number(3.0)),
                ]),
            ))
            .rollout(30)
            .created_at(created)
            .build()
            .unwrap()
    }

    #[test]
    fn document_shape() {
        let value = serde_json::to_value(sample_rule()).unwrap();

        assert_eq!(value["kind"], 3);
        assert_eq!(value["rollout"], 30);
        assert_eq!(value["created_at"], "2024-05-01T08:30:00.000000000Z");
        assert_eq!(value["start_time"], timestamp::ZERO);
        assert_eq!(value["activated_at"], timestamp::ZERO);
        assert_eq!(value["criteria"]["user"]["id"][0], "abc");
        assert_eq!(
            value["buckets"][0]["parameters"],
            serde_json::json!([
                {"name": "feature_x", "type": "bool", "value": true},
                {"name": "limit", "type": "number", "value": 3.0},
            ])
        );
    }

    #[test]
    fn absent_criteria_is_omitted() {
        let rule = Rule::builder("id", "config", "flag", Kind::Override)
            .bucket(Bucket::new("default", Parameters::from([("a", true)])))
            .build()
            .unwrap();
        let value = serde_json::to_value(rule).unwrap();

        assert!(value.get("criteria").is_none());
    }

    #[test]
    fn decode_restores_rule() {
        let rule = sample_rule();
        let json = serde_json::to_string(&rule).unwrap();
        let decoded: Rule = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, rule);
        assert!(decoded.start_time().is_none());
    }

    #[test]
    fn decode_validates() {
        let json = r#"{
            "buckets": [],
            "config_id": "base",
            "created_at": "2024-01-01T00:00:00Z",
            "id": "r",
            "kind": 1,
            "name": "empty"
        }"#;
        let err = serde_json::from_str::<Rule>(json).unwrap_err();
        assert!(err.to_string().contains("missing buckets"));
    }

    #[test]
    fn decode_rejects_unknown_kind_and_zero_created_at() {
        let bucket = r#"[{"name":"d","percentage":0,"parameters":[]}]"#;

        let unknown_kind = format!(
            r#"{{"buckets":{bucket},"config_id":"c","created_at":"2024-01-01T00:00:00Z","id":"r","kind":9,"name":"n"}}"#
        );
        assert!(serde_json::from_str::<Rule>(&unknown_kind)
            .unwrap_err()
            .to_string()
            .contains("unknown kind 9"));

        let zero_created = format!(
            r#"{{"buckets":{bucket},"config_id":"c","created_at":"{}","id":"r","kind":1,"name":"n"}}"#,
            timestamp::ZERO
        );
        assert!(serde_json::from_str::<Rule>(&zero_created)
            .unwrap_err()
            .to_string()
            .contains("missing created at"));
    }

    #[test]
    fn declared_type_must_match_value() {
        let json = r#"{"name":"d","percentage":0,"parameters":[{"name":"x","type":"string","value":true}]}"#;
        let err = serde_json::from_str::<BucketDocument>(json).unwrap_err();
        assert!(err.to_string().contains("'x' declared as string but holds bool"));
    }

    #[test]
    fn repeated_parameter_name_is_rejected() {
        let json = r#"{"name":"d","percentage":0,"parameters":[
            {"name":"x","type":"bool","value":true},
            {"name":"x","type":"bool","value":false}]}"#;
        let err = serde_json::from_str::<BucketDocument>(json).unwrap_err();
        assert!(err.to_string().contains("'x' is declared twice"));
    }

    #[test]
    fn empty_string_list_keeps_declared_type() {
        let json = r#"{"name":"d","percentage":0,"parameters":[{"name":"tags","type":"string_list","value":[]}]}"#;
        let bucket: BucketDocument = serde_json::from_str(json).unwrap();
        assert_eq!(
            bucket.parameters.get("tags"),
            Some(&ParameterValue::Strings(Vec::new()))
        );
    }

    #[test]
    fn null_times_are_unset() {
        let json = r#"{"buckets":[{"name":"d","percentage":0,"parameters":[]}],"config_id":"c",
            "created_at":"2024-01-01T00:00:00Z","end_time":null,"id":"r","kind":1,"name":"n"}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.end_time().is_none());
        assert_eq!(rule.updated_at(), rule.created_at());
    }
}
