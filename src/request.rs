//! Request capability consumed by cache rules
//!
//! Rules never look at a concrete HTTP type. They go through the [`Request`]
//! trait, which exposes the URL, header, query-parameter and cookie lookups a
//! rule needs. [`HttpRequest`] is a self-contained implementation for hosts
//! that do not have their own request type.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use url::Url;

/// A single attribute value as seen by the matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Plain scalar value
    Text(String),

    /// Keyed value list, e.g. `filter[color]=red&filter[size]=m`.
    /// Member order is preserved as received.
    Map(Vec<(String, String)>),
}

impl AttributeValue {
    /// Render the value as it contributes to a cache key.
    ///
    /// Maps are flattened into `key=value` pairs with no separator.
    pub fn to_key_fragment(&self) -> String {
        match self {
            AttributeValue::Text(value) => value.clone(),
            AttributeValue::Map(members) => members
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect(),
        }
    }

    /// Get the scalar value, if this is one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            AttributeValue::Map(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key_fragment())
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

/// Observable request attributes and match primitives.
///
/// The `match_*` methods return the matched value, which may differ from the
/// pattern (for example a captured substring), or `None` when the attribute is
/// absent or does not match. Called without a pattern they act as a presence
/// test and return the live value.
pub trait Request {
    /// The concrete request URL
    fn url(&self) -> &str;

    /// Whether the request URL matches `pattern`
    fn match_url(&self, pattern: &str) -> bool;

    /// Match a header by name, optionally against a pattern
    fn match_header(&self, name: &str, pattern: Option<&str>) -> Option<AttributeValue>;

    /// Match a query parameter by name, optionally against a pattern
    fn match_query_param(&self, name: &str, pattern: Option<&str>) -> Option<AttributeValue>;

    /// Match a cookie by name, optionally against a pattern
    fn match_cookie(&self, name: &str, pattern: Option<&str>) -> Option<AttributeValue>;

    /// All live headers
    fn headers(&self) -> Vec<(String, AttributeValue)>;

    /// All live query parameters
    fn query_params(&self) -> Vec<(String, AttributeValue)>;

    /// All live cookies
    fn cookies(&self) -> Vec<(String, AttributeValue)>;
}

/// In-memory request built from a URL plus headers and cookies.
///
/// Patterns are regular expressions anchored to the whole value. If the
/// pattern contains a capture group, the first group is the matched value.
/// Header names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    url: String,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, AttributeValue)>,
    cookies: Vec<(String, String)>,
}

impl HttpRequest {
    /// Create a request for `url`, parsing its query string.
    ///
    /// Relative URLs such as `/blog?page=2` are accepted.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let parsed = Url::parse(&url).or_else(|_| {
            Url::parse("http://localhost").and_then(|base| base.join(&url))
        });

        let mut request = Self {
            url: url.clone(),
            ..Default::default()
        };

        match parsed {
            Ok(parsed) => {
                request.path = parsed.path().to_string();
                for (name, value) in parsed.query_pairs() {
                    request.push_query(&name, &value);
                }
            }
            Err(e) => {
                warn!("Unparseable request URL {:?}: {}", url, e);
                request.path = url.split('?').next().unwrap_or_default().to_string();
            }
        }

        request
    }

    /// Add or replace a header. A `Cookie` header is also parsed into cookies.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();

        if name == "cookie" {
            for pair in value.split(';') {
                if let Some((k, v)) = pair.split_once('=') {
                    upsert(&mut self.cookies, k.trim().to_string(), v.trim().to_string());
                }
            }
        }

        upsert(&mut self.headers, name, value);
        self
    }

    /// Add or replace a cookie
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        upsert(&mut self.cookies, name.into(), value.into());
        self
    }

    /// Add or replace a query parameter without touching the URL
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        upsert(&mut self.query, name.into(), value.into());
        self
    }

    /// The URL path used by [`Request::match_url`]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn push_query(&mut self, raw_name: &str, value: &str) {
        let bracketed = raw_name
            .strip_suffix(']')
            .and_then(|rest| rest.split_once('['));

        match bracketed {
            Some((name, member)) if !name.is_empty() => {
                let index = match self.query.iter().position(|(n, _)| n == name) {
                    Some(index) => index,
                    None => {
                        self.query
                            .push((name.to_string(), AttributeValue::Map(Vec::new())));
                        self.query.len() - 1
                    }
                };

                // a later `name[..]` overrides an earlier plain `name`
                let slot = &mut self.query[index].1;
                if !matches!(slot, AttributeValue::Map(_)) {
                    *slot = AttributeValue::Map(Vec::new());
                }
                if let AttributeValue::Map(members) = slot {
                    let member = if member.is_empty() {
                        members.len().to_string()
                    } else {
                        member.to_string()
                    };
                    upsert(members, member, value.to_string());
                }
            }
            _ => upsert(
                &mut self.query,
                raw_name.to_string(),
                AttributeValue::Text(value.to_string()),
            ),
        }
    }
}

impl Request for HttpRequest {
    fn url(&self) -> &str {
        &self.url
    }

    fn match_url(&self, pattern: &str) -> bool {
        compile(pattern).is_some_and(|re| re.is_match(&self.path))
    }

    fn match_header(&self, name: &str, pattern: Option<&str>) -> Option<AttributeValue> {
        let name = name.to_ascii_lowercase();
        let value = lookup(&self.headers, &name)?;
        match_value(&AttributeValue::Text(value.to_string()), pattern)
    }

    fn match_query_param(&self, name: &str, pattern: Option<&str>) -> Option<AttributeValue> {
        let value = lookup(&self.query, name)?;
        match_value(value, pattern)
    }

    fn match_cookie(&self, name: &str, pattern: Option<&str>) -> Option<AttributeValue> {
        let value = lookup(&self.cookies, name)?;
        match_value(&AttributeValue::Text(value.to_string()), pattern)
    }

    fn headers(&self) -> Vec<(String, AttributeValue)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::Text(v.clone())))
            .collect()
    }

    fn query_params(&self) -> Vec<(String, AttributeValue)> {
        self.query.clone()
    }

    fn cookies(&self) -> Vec<(String, AttributeValue)> {
        self.cookies
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::Text(v.clone())))
            .collect()
    }
}

fn upsert<V>(pairs: &mut Vec<(String, V)>, name: String, value: V) {
    match pairs.iter_mut().find(|(n, _)| *n == name) {
        Some((_, slot)) => *slot = value,
        None => pairs.push((name, value)),
    }
}

fn lookup<'a, V>(pairs: &'a [(String, V)], name: &str) -> Option<&'a V> {
    pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Invalid match pattern {:?}: {}", pattern, e);
            None
        }
    }
}

fn match_value(value: &AttributeValue, pattern: Option<&str>) -> Option<AttributeValue> {
    let Some(pattern) = pattern else {
        return Some(value.clone());
    };
    let re = compile(pattern)?;

    match value {
        AttributeValue::Text(text) => {
            let caps = re.captures(text)?;
            let matched = caps.get(1).or_else(|| caps.get(0))?.as_str();
            if matched.is_empty() {
                None
            } else {
                Some(AttributeValue::Text(matched.to_string()))
            }
        }
        AttributeValue::Map(members) => {
            if !members.is_empty() && members.iter().all(|(_, v)| re.is_match(v)) {
                Some(value.clone())
            } else {
                None
            }
        }
    }
}
