//! Request-level cache flow
//!
//! [`ResponseCache`] runs one request through the rule set and the storage:
//! the first matching rule yields a key, the key is looked up, and on a miss
//! the caller renders the body and hands it back through [`ResponseCache::save`].

use crate::error::Result;
use crate::payload::{MatchedRule, ReadPayload};
use crate::request::Request;
use crate::rules::RuleSet;
use crate::storage::{CacheStorage, StorageStats};
use tracing::{debug, info};

/// Outcome of looking up one request
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// No rule matched; the response must not be cached
    Uncacheable,

    /// A rule matched but nothing usable is stored under its key
    Miss(MatchedRule),

    /// Stored content was found
    Hit(ReadPayload),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    /// The matched rule, for both hits and misses
    pub fn matched_rule(&self) -> Option<&MatchedRule> {
        match self {
            CacheLookup::Uncacheable => None,
            CacheLookup::Miss(rule) => Some(rule),
            CacheLookup::Hit(payload) => Some(payload.rule()),
        }
    }
}

/// Rule set bound to a storage backend
pub struct ResponseCache<S: CacheStorage> {
    rules: RuleSet,
    storage: S,
}

impl<S: CacheStorage> ResponseCache<S> {
    pub fn new(rules: RuleSet, storage: S) -> Self {
        info!(
            "Response cache ready: {} rules on {} storage",
            rules.len(),
            storage.name()
        );
        Self { rules, storage }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Mutable access to the rules, e.g. to append tags
    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Match the request and read its cached body
    pub fn lookup(&self, request: &dyn Request) -> Result<CacheLookup> {
        let Some(matched) = self.rules.match_request(request)? else {
            return Ok(CacheLookup::Uncacheable);
        };

        match self.storage.read(matched.key())? {
            Some(content) => {
                let remaining = self.storage.remaining_ttl();
                debug!(
                    "Serving {} from cache via rule '{}' ({}s left)",
                    request.url(),
                    matched.rule().name(),
                    remaining
                );
                let key = matched.key().to_string();
                Ok(CacheLookup::Hit(
                    ReadPayload::new(key, Some(content), matched).with_remaining_ttl(remaining),
                ))
            }
            None => {
                debug!(
                    "Cache miss for {} via rule '{}'",
                    request.url(),
                    matched.rule().name()
                );
                Ok(CacheLookup::Miss(matched))
            }
        }
    }

    /// Store a freshly rendered body under the matched key
    pub fn save(&self, matched: &MatchedRule, content: &str) -> Result<()> {
        self.storage.save(matched.key(), content, matched.ttl())
    }

    /// Finish a request served from cache.
    ///
    /// Purges the entry when the payload's purge flag is set and returns
    /// whether an entry was removed.
    pub fn complete(&self, payload: ReadPayload) -> Result<bool> {
        if !payload.purge_flag() {
            return Ok(false);
        }

        debug!("Purge requested for {}", payload.key());
        self.storage.purge(payload.key())
    }

    pub fn purge(&self, key: &str) -> Result<bool> {
        self.storage.purge(key)
    }

    pub fn stats(&self) -> StorageStats {
        self.storage.stats()
    }
}
