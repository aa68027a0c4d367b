//! Filesystem storage backend
//!
//! Each key is stored as a JSON envelope at
//! `<root>/<key[0..2]>/<key[2..4]>/<key>`. The two shard levels keep
//! directory sizes bounded for large key spaces. Shard directories are
//! created on first write. A missing file is a miss; an entry that cannot
//! be decoded is removed and counted as a miss; any other I/O failure is
//! returned to the caller.

use crate::error::{HrcError, Result};
use crate::storage::config::StorageConfig;
use crate::storage::entry::Envelope;
use crate::storage::types::{CacheValue, ReadState, StorageStats};
use crate::storage::CacheStorage;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shortest key that can be sharded
pub const MIN_KEY_LEN: usize = 4;

/// Cache storage backed by a directory tree
pub struct FileSystemStorage {
    config: StorageConfig,
    state: Mutex<ReadState>,
}

impl FileSystemStorage {
    /// Create the storage, creating the root directory if needed
    pub fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.cache_dir)?;

        info!(
            "Initialized filesystem cache storage at {:?} (atomic writes: {})",
            config.cache_dir, config.atomic_writes
        );

        Ok(Self {
            state: Mutex::new(ReadState::new(config.enable_metrics)),
            config,
        })
    }

    /// Create the storage at `dir` with default settings
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(StorageConfig::builder().cache_dir(dir).build())
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.config.cache_dir
    }

    /// Path of the file holding `key`
    pub fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = key.len() >= MIN_KEY_LEN
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(HrcError::InvalidKey(key.to_string()));
        }

        Ok(self
            .config
            .cache_dir
            .join(&key[0..2])
            .join(&key[2..4])
            .join(key))
    }

    fn state(&self) -> MutexGuard<'_, ReadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(path: &Path, data: &str) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl CacheStorage for FileSystemStorage {
    fn read(&self, key: &str) -> Result<Option<CacheValue>> {
        let path = self.entry_path(key)?;

        // only NotFound is a miss; any other I/O failure is surfaced
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache miss: {}", key);
                self.state().miss();
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let decoded = String::from_utf8(bytes)
            .map_err(|e| HrcError::SerializationError(e.to_string()))
            .and_then(|raw| Envelope::from_json(&raw));

        let envelope = match decoded {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Discarding corrupt cache entry {}: {}", key, e);
                Self::remove(&path)?;
                self.state().miss();
                return Ok(None);
            }
        };

        if envelope.is_expired() {
            debug!("Cache entry expired: {}", key);
            Self::remove(&path)?;
            self.state().expired();
            return Ok(None);
        }

        debug!("Cache hit: {}", key);
        self.state().hit(envelope.remaining_ttl());
        Ok(Some(envelope.content))
    }

    fn remaining_ttl(&self) -> u64 {
        self.state().remaining_ttl
    }

    fn save(&self, key: &str, content: &str, ttl: u64) -> Result<()> {
        let path = self.entry_path(key)?;
        let data = Envelope::new(content.to_string(), ttl).to_json()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        if self.config.atomic_writes {
            Self::write_atomic(&path, &data)?;
        } else {
            fs::write(&path, data)?;
        }

        debug!("Saved cache entry {} (ttl {}s)", key, ttl);
        self.state().write();
        Ok(())
    }

    fn purge(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key)?;
        let removed = Self::remove(&path)?;

        if removed {
            debug!("Purged cache entry: {}", key);
            self.state().purge();
        }
        Ok(removed)
    }

    fn stats(&self) -> StorageStats {
        self.state().stats.clone()
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
