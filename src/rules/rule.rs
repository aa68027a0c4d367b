//! Cache rule definition and request matching

use crate::error::{HrcError, Result};
use crate::request::{AttributeValue, Request};
use crate::rules::callback::{CallbackId, CallbackRegistry};
use crate::rules::key::KeyBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Match category, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Url,
    Header,
    Query,
    Cookie,
    Callback,
}

impl Category {
    /// All categories in evaluation order
    pub const ALL: [Category; 5] = [
        Category::Url,
        Category::Header,
        Category::Query,
        Category::Cookie,
        Category::Callback,
    ];

    /// Position in the evaluation order
    pub fn position(&self) -> usize {
        match self {
            Category::Url => 0,
            Category::Header => 1,
            Category::Query => 2,
            Category::Cookie => 3,
            Category::Callback => 4,
        }
    }

    /// Label prefixed to each token of this category in the key material
    pub fn key_label(&self) -> &'static str {
        match self {
            Category::Url => "Url",
            Category::Header => "Header",
            Category::Query => "Query",
            Category::Cookie => "Cookie",
            Category::Callback => "callback",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Url => write!(f, "Url"),
            Category::Header => write!(f, "Header"),
            Category::Query => write!(f, "Query"),
            Category::Cookie => write!(f, "Cookie"),
            Category::Callback => write!(f, "Callback"),
        }
    }
}

/// Condition on a single named attribute.
///
/// In rule files a number is read as a pattern matching that literal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// `true`: attribute must be present. `false`: attribute must be absent.
    Flag(bool),

    /// Attribute must match the pattern; the matched value goes into the key
    Pattern(String),
}

impl From<bool> for FieldSpec {
    fn from(flag: bool) -> Self {
        FieldSpec::Flag(flag)
    }
}

impl From<&str> for FieldSpec {
    fn from(pattern: &str) -> Self {
        FieldSpec::Pattern(pattern.to_string())
    }
}

impl From<String> for FieldSpec {
    fn from(pattern: String) -> Self {
        FieldSpec::Pattern(pattern)
    }
}

/// Specification for the header, query or cookie category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "crate::rules::config::RawCategorySpec")]
pub enum CategorySpec {
    /// `"*"`: capture every live attribute without testing anything
    CaptureAll,

    /// Named conditions, in declaration order
    Fields(Vec<(String, FieldSpec)>),
}

impl CategorySpec {
    /// Build a field list. A repeated name replaces the earlier condition.
    pub fn fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldSpec>,
    {
        let mut declared: Vec<(String, FieldSpec)> = Vec::new();
        for (name, spec) in fields {
            let name = name.into();
            let spec = spec.into();
            match declared.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => *slot = spec,
                None => declared.push((name, spec)),
            }
        }
        CategorySpec::Fields(declared)
    }

    /// Whether this is the capture-all form
    pub fn is_capture_all(&self) -> bool {
        matches!(self, CategorySpec::CaptureAll)
    }
}

/// Declared match conditions, one optional entry per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRules {
    /// URL pattern
    #[serde(rename = "Url", default)]
    pub url: Option<String>,

    #[serde(rename = "Header", default)]
    pub header: Option<CategorySpec>,

    #[serde(rename = "Query", default)]
    pub query: Option<CategorySpec>,

    #[serde(rename = "Cookie", default)]
    pub cookie: Option<CategorySpec>,

    /// Callbacks, invoked in order
    #[serde(rename = "Callback", default)]
    pub callback: Option<Vec<CallbackId>>,
}

impl MatchRules {
    /// Whether no category is declared
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.header.is_none()
            && self.query.is_none()
            && self.cookie.is_none()
            && self.callback.is_none()
    }

    /// Declared categories in evaluation order
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| match category {
                Category::Url => self.url.is_some(),
                Category::Header => self.header.is_some(),
                Category::Query => self.query.is_some(),
                Category::Cookie => self.cookie.is_some(),
                Category::Callback => self.callback.is_some(),
            })
            .collect()
    }

    /// All referenced callback identifiers
    pub fn callbacks(&self) -> &[CallbackId] {
        self.callback.as_deref().unwrap_or_default()
    }
}

/// Attribute-bearing categories
#[derive(Debug, Clone, Copy)]
enum Attribute {
    Header,
    Query,
    Cookie,
}

impl Attribute {
    fn category(self) -> Category {
        match self {
            Attribute::Header => Category::Header,
            Attribute::Query => Category::Query,
            Attribute::Cookie => Category::Cookie,
        }
    }

    fn lookup(self, request: &dyn Request, name: &str, pattern: Option<&str>) -> Option<AttributeValue> {
        match self {
            Attribute::Header => request.match_header(name, pattern),
            Attribute::Query => request.match_query_param(name, pattern),
            Attribute::Cookie => request.match_cookie(name, pattern),
        }
    }

    fn live(self, request: &dyn Request) -> Vec<(String, AttributeValue)> {
        match self {
            Attribute::Header => request.headers(),
            Attribute::Query => request.query_params(),
            Attribute::Cookie => request.cookies(),
        }
    }
}

/// A cache rule: match conditions plus the TTL and tags applied on a match
#[derive(Debug, Clone)]
pub struct CacheRule {
    name: String,
    ttl: u64,
    tags: Vec<String>,
    match_rules: MatchRules,
    rule_config: Map<String, Value>,
}

impl CacheRule {
    /// Create a rule. Fails when `tags` is empty.
    pub fn new(
        name: impl Into<String>,
        ttl: u64,
        tags: Vec<String>,
        match_rules: MatchRules,
        rule_config: Map<String, Value>,
    ) -> Result<Self> {
        let name = name.into();
        let tags = dedup_tags(tags);
        if tags.is_empty() {
            return Err(HrcError::ConfigError(format!(
                "cache rule '{}' must contain at least one tag",
                name
            )));
        }

        Ok(Self {
            name,
            ttl,
            tags,
            match_rules,
            rule_config,
        })
    }

    /// Start building a rule
    pub fn builder(name: impl Into<String>) -> CacheRuleBuilder {
        CacheRuleBuilder::new(name)
    }

    /// Rule name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time-to-live in seconds
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Associated tags
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Declared match conditions
    pub fn match_rules(&self) -> &MatchRules {
        &self.match_rules
    }

    /// Extra attributes passed through to consumers
    pub fn config(&self) -> &Map<String, Value> {
        &self.rule_config
    }

    /// Replace the tag set. The new set must not be empty.
    pub fn set_tags(&mut self, tags: Vec<String>) -> Result<()> {
        let tags = dedup_tags(tags);
        if tags.is_empty() {
            return Err(HrcError::ConfigError(format!(
                "cache rule '{}' must contain at least one tag",
                self.name
            )));
        }
        self.tags = tags;
        Ok(())
    }

    /// Add tags not already present, keeping existing order
    pub fn append_tags<I>(&mut self, tags: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Evaluate the rule against `request`.
    ///
    /// Returns the cache key on a match and `Ok(None)` otherwise. Categories
    /// are evaluated in the order Url, Header, Query, Cookie, Callback and the
    /// first failing condition ends evaluation. An unregistered callback is an
    /// error, not a non-match.
    pub fn match_request(
        &self,
        request: &dyn Request,
        callbacks: &CallbackRegistry,
    ) -> Result<Option<String>> {
        if self.match_rules.is_empty() {
            debug!("Rule {} has no match conditions", self.name);
            return Ok(None);
        }

        let mut key = KeyBuilder::new();

        if let Some(pattern) = &self.match_rules.url {
            if !request.match_url(pattern) {
                debug!("Rule {}: url does not match {}", self.name, pattern);
                return Ok(None);
            }
            key.push(Category::Url, request.url());
        }

        let attribute_specs = [
            (Attribute::Header, &self.match_rules.header),
            (Attribute::Query, &self.match_rules.query),
            (Attribute::Cookie, &self.match_rules.cookie),
        ];
        for (attribute, spec) in attribute_specs {
            if let Some(spec) = spec {
                if !self.match_attribute(request, attribute, spec, &mut key) {
                    return Ok(None);
                }
            }
        }

        for id in self.match_rules.callbacks() {
            let callback = callbacks.resolve(id)?;
            match (**callback)(request, self) {
                Some(token) if !token.is_empty() => key.push(Category::Callback, token),
                _ => {
                    debug!("Rule {}: callback {} rejected the request", self.name, id);
                    return Ok(None);
                }
            }
        }

        if key.is_empty() {
            debug!("Rule {} produced no key tokens", self.name);
            return Ok(None);
        }

        let cache_key = key.build();
        debug!("Rule {} matched with key {}", self.name, cache_key);
        Ok(Some(cache_key))
    }

    fn match_attribute(
        &self,
        request: &dyn Request,
        attribute: Attribute,
        spec: &CategorySpec,
        key: &mut KeyBuilder,
    ) -> bool {
        let category = attribute.category();

        match spec {
            CategorySpec::CaptureAll => {
                let mut live = attribute.live(request);
                live.sort_by(|a, b| a.0.cmp(&b.0));
                for (name, value) in live {
                    key.push(category, format!("{}:{}", name, value.to_key_fragment()));
                }
                true
            }
            CategorySpec::Fields(fields) => {
                let mut fields: Vec<&(String, FieldSpec)> = fields.iter().collect();
                fields.sort_by(|a, b| a.0.cmp(&b.0));

                for (name, field) in fields {
                    match field {
                        FieldSpec::Flag(required) => {
                            let present = attribute.lookup(request, name, None).is_some();
                            if present != *required {
                                debug!(
                                    "Rule {}: {} {} is {}",
                                    self.name,
                                    category,
                                    name,
                                    if present { "present" } else { "absent" }
                                );
                                return false;
                            }
                            key.push(category, name.clone());
                        }
                        FieldSpec::Pattern(pattern) => {
                            match attribute.lookup(request, name, Some(pattern)) {
                                Some(value) => key.push(
                                    category,
                                    format!("{}:{}", name, value.to_key_fragment()),
                                ),
                                None => {
                                    debug!(
                                        "Rule {}: {} {} does not match {}",
                                        self.name, category, name, pattern
                                    );
                                    return false;
                                }
                            }
                        }
                    }
                }
                true
            }
        }
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

/// Builder for [`CacheRule`]
#[derive(Debug)]
pub struct CacheRuleBuilder {
    name: String,
    ttl: u64,
    tags: Vec<String>,
    match_rules: MatchRules,
    rule_config: Map<String, Value>,
    callbacks: Vec<String>,
}

impl CacheRuleBuilder {
    /// Create a builder for a rule named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl: 0,
            tags: Vec::new(),
            match_rules: MatchRules::default(),
            rule_config: Map::new(),
            callbacks: Vec::new(),
        }
    }

    /// Set the time-to-live in seconds
    pub fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add several tags
    pub fn tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Require the URL to match `pattern`
    pub fn url(mut self, pattern: impl Into<String>) -> Self {
        self.match_rules.url = Some(pattern.into());
        self
    }

    /// Set the header condition
    pub fn header(mut self, spec: CategorySpec) -> Self {
        self.match_rules.header = Some(spec);
        self
    }

    /// Set the query-parameter condition
    pub fn query(mut self, spec: CategorySpec) -> Self {
        self.match_rules.query = Some(spec);
        self
    }

    /// Set the cookie condition
    pub fn cookie(mut self, spec: CategorySpec) -> Self {
        self.match_rules.cookie = Some(spec);
        self
    }

    /// Append a callback identifier (`Owner::operation`)
    pub fn callback(mut self, identifier: impl Into<String>) -> Self {
        self.callbacks.push(identifier.into());
        self
    }

    /// Set a pass-through config attribute
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.rule_config.insert(key.into(), value.into());
        self
    }

    /// Build the rule, validating tags and callback identifiers
    pub fn build(self) -> Result<CacheRule> {
        let mut match_rules = self.match_rules;
        if !self.callbacks.is_empty() {
            let ids = self
                .callbacks
                .iter()
                .map(|identifier| CallbackId::parse(identifier))
                .collect::<Result<Vec<_>>>()?;
            match_rules.callback = Some(ids);
        }

        CacheRule::new(self.name, self.ttl, self.tags, match_rules, self.rule_config)
    }
}
