//! Cache provider trait and stored payload type.
//!
//! The provider is the only shared mutable resource in the caching layer:
//! cached results and generation counters both live behind it. Strategies
//! decide *what* goes under *which* key; the provider decides how it is
//! stored and when it is physically evicted.

use std::fmt;
use std::time::Duration;

use repocache_core::RepoCacheResult;
use serde::{de::DeserializeOwned, Serialize};

/// Serialized cached result.
///
/// Payloads are JSON-encoded so any provider can store them as opaque
/// bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedValue(Vec<u8>);

impl CachedValue {
    /// Serialize a result for storage.
    pub fn encode<R: Serialize>(value: &R) -> RepoCacheResult<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    /// Deserialize a stored result.
    pub fn decode<R: DeserializeOwned>(&self) -> RepoCacheResult<R> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Payload of a `None` result. Stored as the write-through entry of a
    /// deleted entity.
    pub fn none() -> Self {
        Self(b"null".to_vec())
    }

    /// Wrap raw bytes previously produced by [`CachedValue::as_bytes`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CachedValue({} bytes)", self.0.len())
    }
}

/// Atomic key-value store backing the cache.
///
/// Implementations must be thread-safe. Concurrent `set` calls on the same
/// key may resolve last-write-wins but must never corrupt the entry, and
/// `increment` must be atomic.
pub trait CacheProvider: Send + Sync {
    /// Check whether a live entry exists.
    fn exists(&self, key: &str) -> RepoCacheResult<bool>;

    /// Get a live entry. Expired entries are reported as absent.
    fn get(&self, key: &str) -> RepoCacheResult<Option<CachedValue>>;

    /// Store an entry, optionally with an absolute expiration `ttl` from now.
    fn set(&self, key: &str, value: CachedValue, ttl: Option<Duration>) -> RepoCacheResult<()>;

    /// Store an entry only if no live entry exists under `key`. Returns
    /// whether the value was stored. The check and the write are atomic.
    fn set_if_absent(
        &self,
        key: &str,
        value: CachedValue,
        ttl: Option<Duration>,
    ) -> RepoCacheResult<bool>;

    /// Remove an entry. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> RepoCacheResult<()>;

    /// Current value of a generation counter; 0 if it was never bumped.
    fn counter(&self, key: &str) -> RepoCacheResult<u64>;

    /// Atomically increment a generation counter, returning the new value.
    fn increment(&self, key: &str) -> RepoCacheResult<u64>;

    /// Drop every entry and counter held by this provider.
    fn clear(&self) -> RepoCacheResult<()>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped because they expired.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
