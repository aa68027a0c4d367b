//! Rule file format
//!
//! Rules are normally declared in a JSON or YAML file:
//!
//! ```yaml
//! rules:
//!   - name: home
//!     ttl: 60
//!     tags: [home]
//!     match:
//!       Url: "/"
//!       Query: { page: true }
//!       Cookie: { session: false }
//!       Callback: ["Auth::isGuest"]
//!     config:
//!       variant: b
//! ```

use crate::error::{HrcError, Result};
use crate::rules::rule::{CacheRule, CategorySpec, FieldSpec, MatchRules};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Value of the capture-all category spec
pub const CAPTURE_ALL: &str = "*";

/// Field condition as written in a rule file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawFieldSpec {
    Flag(bool),
    Number(serde_json::Number),
    Pattern(String),
}

impl From<RawFieldSpec> for FieldSpec {
    fn from(raw: RawFieldSpec) -> Self {
        match raw {
            RawFieldSpec::Flag(flag) => FieldSpec::Flag(flag),
            RawFieldSpec::Number(number) => FieldSpec::Pattern(number.to_string()),
            RawFieldSpec::Pattern(pattern) => FieldSpec::Pattern(pattern),
        }
    }
}

impl<'de> Deserialize<'de> for FieldSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawFieldSpec::deserialize(deserializer).map(FieldSpec::from)
    }
}

/// Header/Query/Cookie spec as written in a rule file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCategorySpec {
    All(String),
    Fields(BTreeMap<String, FieldSpec>),
}

impl TryFrom<RawCategorySpec> for CategorySpec {
    type Error = HrcError;

    fn try_from(raw: RawCategorySpec) -> Result<Self> {
        match raw {
            RawCategorySpec::All(value) if value == CAPTURE_ALL => Ok(CategorySpec::CaptureAll),
            RawCategorySpec::All(value) => Err(HrcError::ConfigError(format!(
                "category spec must be \"{}\" or a map, got \"{}\"",
                CAPTURE_ALL, value
            ))),
            RawCategorySpec::Fields(fields) => Ok(CategorySpec::fields(fields)),
        }
    }
}

/// One rule as written in a rule file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheRuleConfig {
    pub name: String,
    pub ttl: u64,
    pub tags: Vec<String>,
    #[serde(rename = "match", default)]
    pub match_rules: MatchRules,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl TryFrom<CacheRuleConfig> for CacheRule {
    type Error = HrcError;

    fn try_from(config: CacheRuleConfig) -> Result<Self> {
        CacheRule::new(
            config.name,
            config.ttl,
            config.tags,
            config.match_rules,
            config.config,
        )
    }
}

/// Top level of a rule file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetConfig {
    pub rules: Vec<CacheRuleConfig>,
}

impl RuleSetConfig {
    /// Parse a JSON rule file
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| HrcError::ConfigError(e.to_string()))
    }

    /// Parse a YAML rule file
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|e| HrcError::ConfigError(e.to_string()))
    }

    /// Load a rule file, picking the format from the extension
    /// (`.json`, `.yaml` or `.yml`)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source)?,
            _ => {
                return Err(HrcError::ConfigError(format!(
                    "unsupported rule file extension: {:?}",
                    path
                )))
            }
        };

        info!("Loaded {} cache rules from {:?}", config.rules.len(), path);
        Ok(config)
    }

    /// Convert into validated rules, in file order
    pub fn into_rules(self) -> Result<Vec<CacheRule>> {
        self.rules.into_iter().map(CacheRule::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
rules:
  - name: home
    ttl: 60
    tags: [home]
    match:
      Url: "/"
      Query: { page: true, sort: "(asc|desc)" }
      Header: "*"
      Cookie: { session: false }
      Callback: ["Auth::isGuest"]
    config:
      variant: b
  - name: fallback
    ttl: 10
    tags: [misc]
"#;

    #[test]
    fn test_yaml_rule_file() {
        let rules = RuleSetConfig::from_yaml_str(YAML).unwrap().into_rules().unwrap();
        assert_eq!(rules.len(), 2);

        let home = &rules[0];
        assert_eq!(home.name(), "home");
        assert_eq!(home.ttl(), 60);
        assert_eq!(home.match_rules().url.as_deref(), Some("/"));
        assert_eq!(home.match_rules().header, Some(CategorySpec::CaptureAll));
        assert_eq!(
            home.match_rules().query,
            Some(CategorySpec::Fields(vec![
                ("page".to_string(), FieldSpec::Flag(true)),
                ("sort".to_string(), FieldSpec::Pattern("(asc|desc)".to_string())),
            ]))
        );
        assert_eq!(home.match_rules().callbacks()[0].to_string(), "Auth::isGuest");
        assert_eq!(home.config().get("variant"), Some(&Value::from("b")));

        assert!(rules[1].match_rules().is_empty());
    }

    #[test]
    fn test_json_rule_file() {
        let json = r#"{"rules": [{"name": "a", "ttl": 5, "tags": ["x"], "match": {"Cookie": "*"}}]}"#;
        let rules = RuleSetConfig::from_json_str(json).unwrap().into_rules().unwrap();
        assert_eq!(rules[0].match_rules().cookie, Some(CategorySpec::CaptureAll));
    }

    #[test]
    fn test_invalid_capture_all_string() {
        let json = r#"{"rules": [{"name": "a", "ttl": 5, "tags": ["x"], "match": {"Header": "all"}}]}"#;
        let err = RuleSetConfig::from_json_str(json).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_malformed_callback_rejected() {
        let json = r#"{"rules": [{"name": "a", "ttl": 5, "tags": ["x"], "match": {"Callback": ["Auth"]}}]}"#;
        assert!(RuleSetConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_unknown_category_rejected() {
        let json = r#"{"rules": [{"name": "a", "ttl": 5, "tags": ["x"], "match": {"Method": "GET"}}]}"#;
        assert!(RuleSetConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_numeric_field_is_a_pattern() {
        let yaml = r#"
rules:
  - name: third-page
    ttl: 30
    tags: [list]
    match:
      Query: { page: 3, ratio: 1.5 }
"#;
        let rules = RuleSetConfig::from_yaml_str(yaml).unwrap().into_rules().unwrap();
        assert_eq!(
            rules[0].match_rules().query,
            Some(CategorySpec::Fields(vec![
                ("page".to_string(), FieldSpec::Pattern("3".to_string())),
                ("ratio".to_string(), FieldSpec::Pattern("1.5".to_string())),
            ]))
        );

        let json = r#"{"rules": [{"name": "a", "ttl": 5, "tags": ["x"], "match": {"Query": {"page": 3}}}]}"#;
        let rules = RuleSetConfig::from_json_str(json).unwrap().into_rules().unwrap();
        let callbacks = crate::rules::CallbackRegistry::new();

        let third = crate::request::HttpRequest::new("/?page=3");
        let key = rules[0].match_request(&third, &callbacks).unwrap();
        assert_eq!(key, Some(crate::rules::fingerprint("Query-page:3")));

        let fourth = crate::request::HttpRequest::new("/?page=4");
        assert_eq!(rules[0].match_request(&fourth, &callbacks).unwrap(), None);
    }

    #[test]
    fn test_empty_tags_rejected() {
        let json = r#"{"rules": [{"name": "a", "ttl": 5, "tags": []}]}"#;
        let config = RuleSetConfig::from_json_str(json).unwrap();
        assert!(config.into_rules().is_err());
    }
}
