//! Custom match callbacks
//!
//! A rule may reference callbacks by an `Owner::operation` identifier. The
//! functions themselves live in a [`CallbackRegistry`], which is checked when a
//! [`RuleSet`](crate::rules::RuleSet) is built so that a missing registration
//! is reported up front instead of on the first matching request.

use crate::error::{HrcError, Result};
use crate::request::Request;
use crate::rules::rule::CacheRule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Separator between owner and operation
pub const CALLBACK_DELIMITER: &str = "::";

/// Callback function.
///
/// Returns the key token to contribute, or `None` (or an empty string) to
/// reject the request.
pub type CallbackFn = Arc<dyn Fn(&dyn Request, &CacheRule) -> Option<String> + Send + Sync>;

/// Parsed `Owner::operation` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallbackId {
    owner: String,
    operation: String,
}

impl CallbackId {
    /// Parse an identifier. Exactly two non-empty parts are required.
    pub fn parse(identifier: &str) -> Result<Self> {
        let parts: Vec<&str> = identifier.split(CALLBACK_DELIMITER).collect();

        match parts.as_slice() {
            [owner, operation] if !owner.trim().is_empty() && !operation.trim().is_empty() => {
                Ok(Self {
                    owner: owner.trim().to_string(),
                    operation: operation.trim().to_string(),
                })
            }
            _ => Err(HrcError::InvalidCallback {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Owner part
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Operation part
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, CALLBACK_DELIMITER, self.operation)
    }
}

impl FromStr for CallbackId {
    type Err = HrcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CallbackId {
    type Error = HrcError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CallbackId> for String {
    fn from(id: CallbackId) -> Self {
        id.to_string()
    }
}

/// Table of named callbacks
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<CallbackId, CallbackFn>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `identifier`, replacing any previous one
    pub fn register<F>(&mut self, identifier: &str, callback: F) -> Result<()>
    where
        F: Fn(&dyn Request, &CacheRule) -> Option<String> + Send + Sync + 'static,
    {
        let id = CallbackId::parse(identifier)?;
        self.callbacks.insert(id, Arc::new(callback));
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<F>(mut self, identifier: &str, callback: F) -> Result<Self>
    where
        F: Fn(&dyn Request, &CacheRule) -> Option<String> + Send + Sync + 'static,
    {
        self.register(identifier, callback)?;
        Ok(self)
    }

    /// Look up a callback
    pub fn get(&self, id: &CallbackId) -> Option<&CallbackFn> {
        self.callbacks.get(id)
    }

    /// Look up a callback, failing if it is not registered
    pub fn resolve(&self, id: &CallbackId) -> Result<&CallbackFn> {
        self.get(id)
            .ok_or_else(|| HrcError::UnknownCallback(id.to_string()))
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &CallbackId) -> bool {
        self.callbacks.contains_key(id)
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.callbacks.keys().map(|id| id.to_string()).collect();
        ids.sort();
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let id = CallbackId::parse("Auth::isGuest").unwrap();
        assert_eq!(id.owner(), "Auth");
        assert_eq!(id.operation(), "isGuest");
        assert_eq!(id.to_string(), "Auth::isGuest");
    }

    #[test]
    fn test_parse_malformed() {
        for identifier in ["Auth", "Auth::", "::isGuest", "A::b::c", "", "Auth:isGuest"] {
            let err = CallbackId::parse(identifier).unwrap_err();
            assert!(
                matches!(err, HrcError::InvalidCallback { .. }),
                "{identifier} should be rejected"
            );
            assert!(err.is_configuration_error());
        }
    }

    #[test]
    fn test_registry_resolve() {
        let registry = CallbackRegistry::new()
            .with("Geo::country", |_, _| Some("de".to_string()))
            .unwrap();

        let known = CallbackId::parse("Geo::country").unwrap();
        let unknown = CallbackId::parse("Geo::city").unwrap();

        assert!(registry.contains(&known));
        assert!(registry.resolve(&known).is_ok());
        assert!(matches!(
            registry.resolve(&unknown),
            Err(HrcError::UnknownCallback(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_malformed() {
        let mut registry = CallbackRegistry::new();
        assert!(registry.register("no-delimiter", |_, _| None).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deserialize_from_string() {
        let id: CallbackId = serde_json::from_str("\"Auth::isGuest\"").unwrap();
        assert_eq!(id.operation(), "isGuest");

        let err = serde_json::from_str::<CallbackId>("\"Auth.isGuest\"");
        assert!(err.is_err());
    }
}
