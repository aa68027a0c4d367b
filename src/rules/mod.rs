//! # Cache Rules
//!
//! A cache rule decides whether a request is cacheable and, if it is, derives
//! the cache key from the attributes that matched.
//!
//! ## Matching
//!
//! Categories are evaluated in a fixed order and every declared category must
//! pass:
//!
//! | Category | Declared as | Key token |
//! |----------|-------------|-----------|
//! | `Url` | pattern | `Url-<request url>` |
//! | `Header` / `Query` / `Cookie` | `"*"` or map of name → `true` / `false` / pattern | `<name>` or `<name>:<value>` |
//! | `Callback` | list of `Owner::operation` | callback return value |
//!
//! Field conditions are sorted by name before evaluation so the key does not
//! depend on declaration order.
//!
//! ## Example
//!
//! ```rust
//! use hrc::request::HttpRequest;
//! use hrc::rules::{CacheRule, CallbackRegistry, CategorySpec, RuleSet};
//!
//! # fn example() -> hrc::Result<()> {
//! let rule = CacheRule::builder("home")
//!     .ttl(60)
//!     .tag("home")
//!     .query(CategorySpec::fields([("page", true)]))
//!     .build()?;
//!
//! let rules = RuleSet::new(vec![rule], CallbackRegistry::new())?;
//!
//! let matched = rules.match_request(&HttpRequest::new("/?page=3"))?;
//! assert!(matched.is_some());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod key;
pub mod rule;
pub mod set;

pub use callback::{CallbackFn, CallbackId, CallbackRegistry};
pub use config::{CacheRuleConfig, RuleSetConfig};
pub use key::{fingerprint, KeyBuilder};
pub use rule::{CacheRule, CacheRuleBuilder, Category, CategorySpec, FieldSpec, MatchRules};
pub use set::RuleSet;
