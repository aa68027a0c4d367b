//! Per-request result carriers

use crate::rules::CacheRule;
use std::sync::Arc;

/// A rule that matched one request, together with the key it produced
#[derive(Debug, Clone)]
pub struct MatchedRule {
    rule: Arc<CacheRule>,
    key: String,
}

impl MatchedRule {
    pub fn new(rule: Arc<CacheRule>, key: impl Into<String>) -> Self {
        Self {
            rule,
            key: key.into(),
        }
    }

    /// The matched rule
    pub fn rule(&self) -> &CacheRule {
        &self.rule
    }

    /// Cache key derived for this request
    pub fn key(&self) -> &str {
        &self.key
    }

    /// TTL of the matched rule, in seconds
    pub fn ttl(&self) -> u64 {
        self.rule.ttl()
    }
}

/// Result of a cache read for one request.
///
/// The purge flag lets response-generation logic ask for the entry to be
/// dropped even though it was a hit.
#[derive(Debug, Clone)]
pub struct ReadPayload {
    key: String,
    content: Option<String>,
    rule: MatchedRule,
    remaining_ttl: u64,
    purge_flag: bool,
}

impl ReadPayload {
    pub fn new(key: impl Into<String>, content: Option<String>, rule: MatchedRule) -> Self {
        Self {
            key: key.into(),
            content,
            rule,
            remaining_ttl: 0,
            purge_flag: false,
        }
    }

    /// Attach the remaining TTL reported by the storage
    pub fn with_remaining_ttl(mut self, remaining_ttl: u64) -> Self {
        self.remaining_ttl = remaining_ttl;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    /// Cached body, if any
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: Option<String>) {
        self.content = content;
    }

    /// Take the cached body out of the payload
    pub fn take_content(&mut self) -> Option<String> {
        self.content.take()
    }

    pub fn rule(&self) -> &MatchedRule {
        &self.rule
    }

    pub fn set_rule(&mut self, rule: MatchedRule) {
        self.rule = rule;
    }

    /// Seconds left before the entry expires, as of the read
    pub fn remaining_ttl(&self) -> u64 {
        self.remaining_ttl
    }

    /// Whether the entry should be purged. Defaults to `false`.
    pub fn purge_flag(&self) -> bool {
        self.purge_flag
    }

    pub fn set_purge_flag(&mut self, flag: bool) {
        self.purge_flag = flag;
    }
}
