//! Fixture files: base configs and rules loaded from JSON or YAML.
//!
//! ```yaml
//! base_configs:
//!   - id: base-1
//!     client_id: client-1
//!     name: app
//!     parameters: {feature_x: false, color: red}
//! rules:
//!   - id: rule-1
//!     config_id: base-1
//!     name: beta
//!     kind: 3
//!     rollout: 30
//!     ...
//! ```
//!
//! Rules use the same document form as the wire (see
//! [`configsum_rule::wire`]), so a fixture file doubles as an export.

use crate::base::{BaseConfig, BaseRepo};
use crate::error::{Error, Result};
use crate::rule::RuleRepo;
use chrono::{Duration, Utc};
use configsum_rule::{Bucket, Criteria, Kind, Matcher, Parameters, Rule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixtures {
    /// Base configs to create.
    #[serde(default)]
    pub base_configs: Vec<BaseConfig>,
    /// Rules to create. Every rule is validated while loading.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Fixtures {
    /// Loads fixtures from a file, picking the format by extension.
    ///
    /// `.json` is parsed as JSON, `.yaml` and `.yml` as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown extension
    /// or holds an invalid base config or rule.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading fixtures from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let fixtures = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&content)?,
            Some("yaml" | "yml") => Self::parse_yaml(&content)?,
            _ => return Err(Error::UnknownFormat(path.display().to_string())),
        };

        info!(
            "Loaded {} base configs and {} rules",
            fixtures.base_configs.len(),
            fixtures.rules.len()
        );
        Ok(fixtures)
    }

    /// Parses fixtures from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or a rule fails validation.
    pub fn parse_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses fixtures from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a rule fails validation.
    pub fn parse_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serializes the fixtures as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Creates every base config and rule in the given repositories.
    ///
    /// # Errors
    ///
    /// Returns the first repository error, typically [`Error::Exists`] for
    /// duplicate ids or names, or [`Error::NotFound`] for a rule whose config
    /// is not among the base configs.
    pub fn seed(&self, bases: &dyn BaseRepo, rules: &dyn RuleRepo) -> Result<()> {
        for config in &self.base_configs {
            debug!(id = %config.id, "seeding base config");
            bases.create(config.clone())?;
        }

        for rule in &self.rules {
            debug!(id = rule.id(), config = rule.config_id(), "seeding rule");
            bases.get_by_id(rule.config_id())?;
            rules.create(rule.clone())?;
        }

        info!(
            "Seeded {} base configs and {} rules",
            self.base_configs.len(),
            self.rules.len()
        );
        Ok(())
    }

    /// A small but complete fixture set: one base config with an override
    /// for a locale and a sticky 30% rollout.
    ///
    /// # Errors
    ///
    /// Returns an error if an example rule fails validation.
    pub fn example() -> Result<Self> {
        let created = Utc::now();

        let base = BaseConfig {
            id: "base-1".to_string(),
            client_id: "client-1".to_string(),
            name: "app".to_string(),
            parameters: Parameters::from([("feature_x", false), ("new_onboarding", false)])
                .merged(&Parameters::from([("color", "red")])),
            deleted: false,
            created_at: created,
            updated_at: created,
        };

        let british = Rule::builder("rule-1", "base-1", "british-blue", Kind::Override)
            .description("Blue for the UK")
            .criteria(Criteria::new().with_locale(Matcher::equals("en-GB")))
            .bucket(Bucket::new("default", Parameters::from([("color", "blue")])))
            .active(true)
            .created_at(created)
            .build()?;

        let onboarding = Rule::builder("rule-2", "base-1", "onboarding-rollout", Kind::Rollout)
            .description("New onboarding for 30% of adult users")
            .criteria(Criteria::new().with_user_age(Matcher::greater_than(17)))
            .bucket(Bucket::new(
                "default",
                Parameters::from([("new_onboarding", true)]),
            ))
            .rollout(30)
            .active(true)
            .created_at(created + Duration::seconds(1))
            .build()?;

        Ok(Self {
            base_configs: vec![base],
            rules: vec![british, onboarding],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::InMemoryBaseRepo;
    use crate::rule::InMemoryRuleRepo;

    const JSON: &str = r#"{
        "base_configs": [
            {"id": "base-1", "client_id": "c", "name": "app",
             "parameters": {"feature_x": false}}
        ],
        "rules": [
            {"id": "r1", "config_id": "base-1", "name": "on", "kind": 1,
             "active": true,
             "created_at": "2024-01-01T00:00:00Z",
             "buckets": [{"name": "default", "percentage": 0,
                          "parameters": [{"name": "feature_x", "type": "bool", "value": true}]}]}
        ]
    }"#;

    const YAML: &str = r"
base_configs:
  - id: base-1
    client_id: c
    name: app
    parameters:
      volume: 0.5
rules:
  - id: r1
    config_id: base-1
    name: louder
    kind: 3
    rollout: 50
    active: true
    created_at: '2024-01-01T00:00:00Z'
    end_time: '0001-01-01T00:00:00Z'
    criteria:
      user:
        age:
          comparator: gt
          value: 20
    buckets:
      - name: default
        percentage: 0
        parameters:
          - name: volume
            type: number
            value: 0.9
";

    #[test]
    fn parse_json_fixtures() {
        let fixtures = Fixtures::parse_json(JSON).unwrap();

        assert_eq!(fixtures.base_configs.len(), 1);
        assert_eq!(fixtures.rules.len(), 1);
        assert_eq!(fixtures.rules[0].kind(), Kind::Override);
    }

    #[test]
    fn parse_yaml_fixtures() {
        let fixtures = Fixtures::parse_yaml(YAML).unwrap();
        let rule = &fixtures.rules[0];

        assert_eq!(rule.kind(), Kind::Rollout);
        assert_eq!(rule.rollout(), 50);
        assert_eq!(rule.end_time(), None);
        assert_eq!(
            rule.buckets()[0].parameters.get("volume"),
            Some(&0.9.into())
        );
        assert_eq!(
            rule.criteria().and_then(|c| c.user.as_ref()).and_then(|u| u.age.clone()),
            Some(Matcher::greater_than(20))
        );
    }

    #[test]
    fn invalid_rule_is_rejected() {
        let broken = JSON.replace(r#""kind": 1"#, r#""kind": 9"#);
        assert!(Fixtures::parse_json(&broken).is_err());
    }

    #[test]
    fn unknown_extension() {
        let path = std::env::temp_dir().join("configsum-fixtures-test.toml");
        std::fs::write(&path, "").unwrap();

        let err = Fixtures::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::UnknownFormat(_)));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn load_file_by_extension() {
        let path = std::env::temp_dir().join("configsum-fixtures-test.yml");
        std::fs::write(&path, YAML).unwrap();

        let fixtures = Fixtures::load_file(&path).unwrap();
        assert_eq!(fixtures.rules[0].name(), "louder");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn seed_repositories() {
        let bases = InMemoryBaseRepo::new();
        let rules = InMemoryRuleRepo::new();

        Fixtures::parse_json(JSON).unwrap().seed(&bases, &rules).unwrap();

        assert_eq!(bases.get_by_name("c", "app").unwrap().id, "base-1");
        assert_eq!(rules.list_all("base-1").unwrap().len(), 1);
    }

    #[test]
    fn seed_rejects_orphan_rule() {
        let fixtures = Fixtures {
            base_configs: Vec::new(),
            ..Fixtures::parse_json(JSON).unwrap()
        };

        let err = fixtures
            .seed(&InMemoryBaseRepo::new(), &InMemoryRuleRepo::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn seed_twice_fails() {
        let bases = InMemoryBaseRepo::new();
        let rules = InMemoryRuleRepo::new();
        let fixtures = Fixtures::parse_json(JSON).unwrap();

        fixtures.seed(&bases, &rules).unwrap();
        assert!(matches!(
            fixtures.seed(&bases, &rules),
            Err(Error::Exists(_))
        ));
    }

    #[test]
    fn example_survives_yaml() {
        let example = Fixtures::example().unwrap();
        let yaml = example.to_yaml().unwrap();

        assert_eq!(Fixtures::parse_yaml(&yaml).unwrap(), example);
    }

    #[test]
    fn example_locale_rule_uses_string_matcher() {
        let example = Fixtures::example().unwrap();
        let locale = example.rules[0]
            .criteria()
            .and_then(|c| c.locale.clone())
            .unwrap();

        assert_eq!(locale, Matcher::equals("en-GB"));
    }
}
