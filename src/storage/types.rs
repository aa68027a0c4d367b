//! Core type definitions for cache storage

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - a fingerprint produced by a matching rule
pub type CacheKey = String;

/// Cache value type - the cached response body
pub type CacheValue = String;

/// Per-backend counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Reads that returned content
    pub hits: u64,

    /// Reads that found nothing (including expired entries)
    pub misses: u64,

    /// Successful saves
    pub writes: u64,

    /// Purges that removed an entry
    pub purges: u64,

    /// Entries removed because their deadline had passed
    pub expirations: u64,
}

impl StorageStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for StorageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, writes: {}, purges: {}, expirations: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.writes,
            self.purges,
            self.expirations
        )
    }
}

/// Mutable per-instance read state shared by the backends.
///
/// `remaining_ttl` is a single slot: it describes the most recent read only.
#[derive(Debug, Default)]
pub(crate) struct ReadState {
    pub(crate) remaining_ttl: u64,
    pub(crate) stats: StorageStats,
    pub(crate) metrics: bool,
}

impl ReadState {
    pub(crate) fn new(metrics: bool) -> Self {
        Self {
            metrics,
            ..Default::default()
        }
    }

    pub(crate) fn hit(&mut self, remaining_ttl: u64) {
        self.remaining_ttl = remaining_ttl;
        if self.metrics {
            self.stats.hits += 1;
        }
    }

    pub(crate) fn miss(&mut self) {
        self.remaining_ttl = 0;
        if self.metrics {
            self.stats.misses += 1;
        }
    }

    pub(crate) fn expired(&mut self) {
        self.miss();
        if self.metrics {
            self.stats.expirations += 1;
        }
    }

    pub(crate) fn write(&mut self) {
        if self.metrics {
            self.stats.writes += 1;
        }
    }

    pub(crate) fn purge(&mut self) {
        if self.metrics {
            self.stats.purges += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_hit_rate() {
        let stats = StorageStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert_eq!(stats.hit_rate(), 80.0);
        assert_eq!(stats.miss_rate(), 20.0);
    }

    #[test]
    fn test_stats_zero_requests() {
        let stats = StorageStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 100.0);
    }

    #[test]
    fn test_stats_display() {
        let stats = StorageStats {
            hits: 100,
            misses: 50,
            writes: 75,
            purges: 3,
            expirations: 5,
        };

        let display = format!("{}", stats);
        assert!(display.contains("hits: 100"));
        assert!(display.contains("expirations: 5"));
    }

    #[test]
    fn test_read_state_slot() {
        let mut state = ReadState::new(true);
        state.hit(30);
        assert_eq!(state.remaining_ttl, 30);

        state.expired();
        assert_eq!(state.remaining_ttl, 0);
        assert_eq!(state.stats.misses, 1);
        assert_eq!(state.stats.expirations, 1);
    }

    #[test]
    fn test_read_state_without_metrics() {
        let mut state = ReadState::new(false);
        state.hit(10);
        state.write();
        assert_eq!(state.remaining_ttl, 10);
        assert_eq!(state.stats, StorageStats::default());
    }
}
