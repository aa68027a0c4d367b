//! # hrc - HTTP response cache
//!
//! Rule-driven caching of rendered HTTP responses.
//!
//! ## Features
//!
//! - Declarative cache rules matching on URL, headers, query parameters,
//!   cookies and registered callbacks
//! - Deterministic cache keys derived from the matched request attributes
//! - Pluggable storage behind the [`CacheStorage`] trait, with filesystem and
//!   in-memory backends
//! - Rule files in JSON or YAML
//!
//! ## Request flow
//!
//! Rules are evaluated in order and the first match wins. Its key is looked
//! up in the storage; on a miss the caller renders the response and saves it
//! with the rule's TTL.
//!
//! ```no_run
//! use hrc::{CacheLookup, CallbackRegistry, FileSystemStorage, HttpRequest, ResponseCache, RuleSet};
//!
//! fn main() -> anyhow::Result<()> {
//!     hrc::init_tracing();
//!
//!     let rules = RuleSet::from_path("cache_rules.yaml", CallbackRegistry::new())?;
//!     let cache = ResponseCache::new(rules, FileSystemStorage::open("/var/cache/hrc")?);
//!
//!     let request = HttpRequest::new("/blog?page=3").with_header("Accept-Language", "en");
//!     let body = match cache.lookup(&request)? {
//!         CacheLookup::Hit(mut payload) => payload.take_content().unwrap_or_default(),
//!         CacheLookup::Miss(matched) => {
//!             let body = String::from("<html>rendered</html>");
//!             cache.save(&matched, &body)?;
//!             body
//!         }
//!         CacheLookup::Uncacheable => String::from("<html>rendered</html>"),
//!     };
//!     println!("{}", body);
//!     Ok(())
//! }
//! ```
//!
//! ## Rule files
//!
//! ```yaml
//! rules:
//!   - name: home
//!     ttl: 60
//!     tags: [home]
//!     match:
//!       Query:
//!         page: true
//!   - name: localized
//!     ttl: 300
//!     tags: [i18n]
//!     match:
//!       Url: "/docs/.*"
//!       Header:
//!         Accept-Language: "(en|de)(-.*)?"
//!       Callback:
//!         - Session::is_anonymous
//! ```

pub mod engine;
pub mod error;
pub mod payload;
pub mod request;
pub mod rules;
pub mod storage;
pub mod telemetry;

// Re-export main types for convenience
pub use engine::{CacheLookup, ResponseCache};
pub use error::{HrcError, Result};
pub use payload::{MatchedRule, ReadPayload};
pub use request::{AttributeValue, HttpRequest, Request};
pub use rules::{
    CacheRule, CacheRuleBuilder, CallbackId, CallbackRegistry, Category, CategorySpec, FieldSpec,
    MatchRules, RuleSet,
};
pub use storage::{
    CacheStorage, FileSystemStorage, MemoryStorage, StorageConfig, StorageConfigBuilder,
    StorageStats,
};
pub use telemetry::init_tracing;
