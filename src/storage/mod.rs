//! # Cache Storage
//!
//! Persists cached bodies under the keys produced by cache rules.
//!
//! ## Contract
//!
//! Every backend implements [`CacheStorage`]:
//!
//! - `read` returns `Ok(None)` for a missing or expired key and never returns
//!   expired content
//! - `remaining_ttl` describes the most recent successful `read` on the same
//!   instance (0 after a miss)
//! - `save` overwrites any existing entry; the deadline is now + ttl
//! - `purge` reports whether an entry was removed
//!
//! Backends may also expire entries on their own, independently of `read`
//! (see [`MemoryStorage::cleanup_expired`]). Callers must not assume expiry
//! only happens as a side effect of a read.
//!
//! ## Example
//!
//! ```rust
//! use hrc::storage::{CacheStorage, FileSystemStorage};
//!
//! # fn example() -> hrc::Result<()> {
//! let dir = std::env::temp_dir().join("hrc-doc-example");
//! let storage = FileSystemStorage::open(&dir)?;
//!
//! storage.save("a1b2c3d4", "<html>cached</html>", 60)?;
//! if let Some(body) = storage.read("a1b2c3d4")? {
//!     println!("Cache hit ({}s left): {}", storage.remaining_ttl(), body);
//! }
//! storage.purge("a1b2c3d4")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod filesystem;
pub mod memory;
pub mod types;

pub use config::{StorageConfig, StorageConfigBuilder};
pub use entry::Envelope;
pub use filesystem::FileSystemStorage;
pub use memory::MemoryStorage;
pub use types::{CacheKey, CacheValue, StorageStats};

use crate::error::Result;
use std::sync::Arc;

/// Storage contract shared by all backends
pub trait CacheStorage: Send + Sync {
    /// Read the content stored under `key`, expiring it if its deadline passed
    fn read(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Remaining TTL, in seconds, of the most recent successful read
    fn remaining_ttl(&self) -> u64;

    /// Store `content` under `key` for `ttl` seconds
    fn save(&self, key: &str, content: &str, ttl: u64) -> Result<()>;

    /// Delete the entry for `key`, returning whether one existed
    fn purge(&self, key: &str) -> Result<bool>;

    /// Counters collected by this instance
    fn stats(&self) -> StorageStats;

    /// Backend name, for logs
    fn name(&self) -> &'static str;
}

impl<S: CacheStorage + ?Sized> CacheStorage for Box<S> {
    fn read(&self, key: &str) -> Result<Option<CacheValue>> {
        (**self).read(key)
    }

    fn remaining_ttl(&self) -> u64 {
        (**self).remaining_ttl()
    }

    fn save(&self, key: &str, content: &str, ttl: u64) -> Result<()> {
        (**self).save(key, content, ttl)
    }

    fn purge(&self, key: &str) -> Result<bool> {
        (**self).purge(key)
    }

    fn stats(&self) -> StorageStats {
        (**self).stats()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<S: CacheStorage + ?Sized> CacheStorage for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<CacheValue>> {
        (**self).read(key)
    }

    fn remaining_ttl(&self) -> u64 {
        (**self).remaining_ttl()
    }

    fn save(&self, key: &str, content: &str, ttl: u64) -> Result<()> {
        (**self).save(key, content, ttl)
    }

    fn purge(&self, key: &str) -> Result<bool> {
        (**self).purge(key)
    }

    fn stats(&self) -> StorageStats {
        (**self).stats()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
