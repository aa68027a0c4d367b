//! Stored entry envelope with an absolute deadline

use crate::error::{HrcError, Result};
use crate::storage::types::CacheValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a backend persists for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// When the entry expires
    pub deadline: DateTime<Utc>,

    /// The cached value
    pub content: CacheValue,
}

impl Envelope {
    /// Create an envelope expiring `ttl` seconds from now
    pub fn new(content: CacheValue, ttl: u64) -> Self {
        Self {
            deadline: deadline_after(ttl),
            content,
        }
    }

    /// Create an envelope with an explicit deadline
    pub fn with_deadline(content: CacheValue, deadline: DateTime<Utc>) -> Self {
        Self { deadline, content }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.deadline
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.deadline {
            None
        } else {
            (self.deadline - now).to_std().ok()
        }
    }

    /// Whole seconds left, rounded up; 0 once expired
    pub fn remaining_ttl(&self) -> u64 {
        let millis = (self.deadline - Utc::now()).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| HrcError::SerializationError(e.to_string()))
    }

    pub fn from_json(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(|e| HrcError::SerializationError(e.to_string()))
    }
}

fn deadline_after(ttl: u64) -> DateTime<Utc> {
    let now = Utc::now();
    i64::try_from(ttl)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_creation() {
        let envelope = Envelope::new("body".to_string(), 60);

        assert_eq!(envelope.content, "body");
        assert!(!envelope.is_expired());
        assert_eq!(envelope.remaining_ttl(), 60);
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let envelope = Envelope::new("body".to_string(), 0);
        assert!(envelope.is_expired());
        assert_eq!(envelope.remaining_ttl(), 0);
        assert!(envelope.time_until_expiration().is_none());
    }

    #[test]
    fn test_past_deadline() {
        let envelope = Envelope::with_deadline(
            "body".to_string(),
            Utc::now() - chrono::Duration::seconds(5),
        );
        assert!(envelope.is_expired());
        assert_eq!(envelope.remaining_ttl(), 0);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let envelope = Envelope::new("body".to_string(), u64::MAX);
        assert!(!envelope.is_expired());
    }

    #[test]
    fn test_json_layout() {
        let envelope = Envelope::new("<html></html>".to_string(), 60);
        let json = envelope.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("deadline").is_some());
        assert_eq!(value["content"], "<html></html>");

        assert_eq!(Envelope::from_json(&json).unwrap(), envelope);
    }

    #[test]
    fn test_corrupt_json() {
        let err = Envelope::from_json("{not json").unwrap_err();
        assert!(matches!(err, HrcError::SerializationError(_)));
    }
}
