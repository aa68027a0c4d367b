//! Ordered rule collection with first-match evaluation

use crate::error::{HrcError, Result};
use crate::payload::MatchedRule;
use crate::request::Request;
use crate::rules::callback::CallbackRegistry;
use crate::rules::config::RuleSetConfig;
use crate::rules::rule::CacheRule;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered cache rules plus the callbacks they reference
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Arc<CacheRule>>,
    callbacks: CallbackRegistry,
}

impl RuleSet {
    /// Create a rule set.
    ///
    /// Fails on duplicate rule names and on callbacks that are not registered.
    pub fn new(rules: Vec<CacheRule>, callbacks: CallbackRegistry) -> Result<Self> {
        let mut names = HashSet::new();
        for rule in &rules {
            if !names.insert(rule.name().to_string()) {
                return Err(HrcError::ConfigError(format!(
                    "duplicate cache rule name '{}'",
                    rule.name()
                )));
            }
            for id in rule.match_rules().callbacks() {
                callbacks.resolve(id)?;
            }
        }

        info!(
            "Initialized rule set with {} rules and {} callbacks",
            rules.len(),
            callbacks.len()
        );

        Ok(Self {
            rules: rules.into_iter().map(Arc::new).collect(),
            callbacks,
        })
    }

    /// Build from a parsed rule file
    pub fn from_config(config: RuleSetConfig, callbacks: CallbackRegistry) -> Result<Self> {
        Self::new(config.into_rules()?, callbacks)
    }

    /// Load a JSON or YAML rule file
    pub fn from_path(path: impl AsRef<Path>, callbacks: CallbackRegistry) -> Result<Self> {
        Self::from_config(RuleSetConfig::from_path(path)?, callbacks)
    }

    pub fn from_json_str(source: &str, callbacks: CallbackRegistry) -> Result<Self> {
        Self::from_config(RuleSetConfig::from_json_str(source)?, callbacks)
    }

    pub fn from_yaml_str(source: &str, callbacks: CallbackRegistry) -> Result<Self> {
        Self::from_config(RuleSetConfig::from_yaml_str(source)?, callbacks)
    }

    /// Evaluate rules in order and return the first match
    pub fn match_request(&self, request: &dyn Request) -> Result<Option<MatchedRule>> {
        for rule in &self.rules {
            if let Some(key) = rule.match_request(request, &self.callbacks)? {
                return Ok(Some(MatchedRule::new(rule.clone(), key)));
            }
        }

        debug!("No cache rule matched {}", request.url());
        Ok(None)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = &CacheRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    /// Find a rule by name
    pub fn get(&self, name: &str) -> Option<&CacheRule> {
        self.rules().find(|rule| rule.name() == name)
    }

    /// Mutable access to a rule, e.g. to append tags at runtime.
    ///
    /// Matches already handed out keep the rule as it was.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CacheRule> {
        self.rules
            .iter_mut()
            .find(|rule| rule.name() == name)
            .map(Arc::make_mut)
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
