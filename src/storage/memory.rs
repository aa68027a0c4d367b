//! In-process storage backend

use crate::error::Result;
use crate::storage::config::StorageConfig;
use crate::storage::entry::Envelope;
use crate::storage::types::{CacheKey, CacheValue, ReadState, StorageStats};
use crate::storage::CacheStorage;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Cache storage held in a process-local map
///
/// Entries expire lazily on `read` and can also be swept in bulk with
/// [`MemoryStorage::cleanup_expired`]. Nothing survives a restart.
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

struct MemoryStore {
    entries: HashMap<CacheKey, Envelope>,
    state: ReadState,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new(config: &StorageConfig) -> Self {
        info!(
            "Initializing in-memory cache storage (metrics: {})",
            config.enable_metrics
        );

        Self {
            store: RwLock::new(MemoryStore {
                entries: HashMap::new(),
                state: ReadState::new(config.enable_metrics),
            }),
        }
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut store = self.write();

        let before = store.entries.len();
        store.entries.retain(|_, envelope| !envelope.is_expired());
        let removed = before - store.entries.len();

        if removed > 0 {
            if store.state.metrics {
                store.state.stats.expirations += removed as u64;
            }
            debug!("Cleaned up {} expired entries", removed);
        }

        removed
    }

    /// Get number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.read_lock().entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.read_lock().entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut store = self.write();
        let count = store.entries.len();
        store.entries.clear();
        info!("Cleared {} entries from cache", count);
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, MemoryStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

impl CacheStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut store = self.write();

        let Some(envelope) = store.entries.get(key) else {
            debug!("Cache miss: {}", key);
            store.state.miss();
            return Ok(None);
        };

        if envelope.is_expired() {
            debug!("Cache entry expired: {}", key);
            store.entries.remove(key);
            store.state.expired();
            return Ok(None);
        }

        let remaining = envelope.remaining_ttl();
        let content = envelope.content.clone();
        store.state.hit(remaining);

        debug!("Cache hit: {}", key);
        Ok(Some(content))
    }

    fn remaining_ttl(&self) -> u64 {
        self.read_lock().state.remaining_ttl
    }

    fn save(&self, key: &str, content: &str, ttl: u64) -> Result<()> {
        let envelope = Envelope::new(content.to_string(), ttl);

        let mut store = self.write();
        if store.entries.insert(key.to_string(), envelope).is_some() {
            debug!("Updating existing cache entry: {}", key);
        } else {
            debug!("Inserting new cache entry: {}", key);
        }
        store.state.write();

        Ok(())
    }

    fn purge(&self, key: &str) -> Result<bool> {
        let mut store = self.write();

        if store.entries.remove(key).is_some() {
            store.state.purge();
            debug!("Removed cache entry: {}", key);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn stats(&self) -> StorageStats {
        self.read_lock().state.stats.clone()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
