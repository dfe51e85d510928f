//! In-process cache provider.
//!
//! Entries live in a `RwLock`-guarded map with an optional absolute
//! expiration. Generation counters are `AtomicU64`s so concurrent bumps on
//! an existing counter only take the read lock.
//!
//! Expired entries are dropped lazily when read, or in bulk with
//! [`InMemoryCacheProvider::purge_expired`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use repocache_core::{ProviderError, RepoCacheResult};

use super::traits::{CacheProvider, CacheStats, CachedValue};

#[derive(Debug, Clone)]
struct Entry {
    value: CachedValue,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// In-memory cache provider.
///
/// # Example
///
/// ```ignore
/// let provider = Arc::new(InMemoryCacheProvider::new());
/// provider.set("k", CachedValue::encode(&42)?, Some(Duration::from_secs(60)))?;
/// assert!(provider.exists("k")?);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCacheProvider {
    entries: RwLock<HashMap<String, Entry>>,
    counters: RwLock<HashMap<String, AtomicU64>>,
    stats: StatsInner,
}

fn poisoned<E>(_: E) -> ProviderError {
    ProviderError::LockPoisoned
}

/// Absolute expiration for an entry written now with `ttl`.
fn expiry(key: &str, ttl: Option<Duration>) -> RepoCacheResult<Option<DateTime<Utc>>> {
    let Some(ttl) = ttl else {
        return Ok(None);
    };
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| ProviderError::Rejected {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    let at = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| ProviderError::Rejected {
            key: key.to_string(),
            reason: "expiration overflows".to_string(),
        })?;
    Ok(Some(at))
}

impl InMemoryCacheProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of usage statistics.
    pub fn stats(&self) -> RepoCacheResult<CacheStats> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        })
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> RepoCacheResult<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> RepoCacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> RepoCacheResult<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = (before - entries.len()) as u64;
        self.stats.evictions.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    fn live_entry(&self, key: &str) -> RepoCacheResult<Option<CachedValue>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().map_err(poisoned)?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().map_err(poisoned)?;
        // Re-check under the write lock; a concurrent set may have refreshed it.
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None)
    }
}

impl CacheProvider for InMemoryCacheProvider {
    fn exists(&self, key: &str) -> RepoCacheResult<bool> {
        Ok(self.live_entry(key)?.is_some())
    }

    fn get(&self, key: &str) -> RepoCacheResult<Option<CachedValue>> {
        let found = self.live_entry(key)?;
        let counter = if found.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    fn set(&self, key: &str, value: CachedValue, ttl: Option<Duration>) -> RepoCacheResult<()> {
        let expires_at = expiry(key, ttl)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: CachedValue,
        ttl: Option<Duration>,
    ) -> RepoCacheResult<bool> {
        let expires_at = expiry(key, ttl)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(Utc::now()) {
                return Ok(false);
            }
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(true)
    }

    fn remove(&self, key: &str) -> RepoCacheResult<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn counter(&self, key: &str) -> RepoCacheResult<u64> {
        let counters = self.counters.read().map_err(poisoned)?;
        Ok(counters
            .get(key)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0))
    }

    fn increment(&self, key: &str) -> RepoCacheResult<u64> {
        {
            let counters = self.counters.read().map_err(poisoned)?;
            if let Some(counter) = counters.get(key) {
                return Ok(counter.fetch_add(1, Ordering::AcqRel) + 1);
            }
        }

        let mut counters = self.counters.write().map_err(poisoned)?;
        let counter = counters
            .entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0));
        Ok(counter.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn clear(&self) -> RepoCacheResult<()> {
        self.entries.write().map_err(poisoned)?.clear();
        self.counters.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn value(n: u32) -> CachedValue {
        CachedValue::encode(&n).expect("encode should succeed")
    }

    #[test]
    fn test_set_and_get() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", value(7), None).unwrap();

        assert!(provider.exists("k").unwrap());
        let got = provider.get("k").unwrap().expect("entry should exist");
        assert_eq!(got.decode::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_get_nonexistent() {
        let provider = InMemoryCacheProvider::new();
        assert!(provider.get("missing").unwrap().is_none());
        assert!(!provider.exists("missing").unwrap());
    }

    #[test]
    fn test_overwrite() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", value(1), None).unwrap();
        provider.set("k", value(2), None).unwrap();
        assert_eq!(provider.get("k").unwrap().unwrap().decode::<u32>().unwrap(), 2);
        assert_eq!(provider.len().unwrap(), 1);
    }

    #[test]
    fn test_set_if_absent_keeps_live_entry() {
        let provider = InMemoryCacheProvider::new();
        assert!(provider.set_if_absent("k", value(1), None).unwrap());
        assert!(!provider.set_if_absent("k", value(2), None).unwrap());
        assert_eq!(provider.get("k").unwrap().unwrap().decode::<u32>().unwrap(), 1);
    }

    #[test]
    fn test_set_if_absent_replaces_expired_entry() {
        let provider = InMemoryCacheProvider::new();
        provider
            .set("k", value(1), Some(Duration::from_millis(10)))
            .unwrap();
        thread::sleep(Duration::from_millis(40));
        assert!(provider.set_if_absent("k", value(2), None).unwrap());
        assert_eq!(provider.get("k").unwrap().unwrap().decode::<u32>().unwrap(), 2);
    }

    #[test]
    fn test_remove() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", value(1), None).unwrap();
        provider.remove("k").unwrap();
        provider.remove("k").unwrap();
        assert!(provider.get("k").unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let provider = InMemoryCacheProvider::new();
        provider
            .set("k", value(1), Some(Duration::from_millis(20)))
            .unwrap();
        assert!(provider.exists("k").unwrap());

        thread::sleep(Duration::from_millis(60));
        assert!(provider.get("k").unwrap().is_none());
        assert_eq!(provider.stats().unwrap().evictions, 1);
        assert!(provider.is_empty().unwrap());
    }

    #[test]
    fn test_purge_expired() {
        let provider = InMemoryCacheProvider::new();
        provider
            .set("a", value(1), Some(Duration::from_millis(10)))
            .unwrap();
        provider.set("b", value(2), None).unwrap();

        thread::sleep(Duration::from_millis(40));
        assert_eq!(provider.purge_expired().unwrap(), 1);
        assert_eq!(provider.len().unwrap(), 1);
    }

    #[test]
    fn test_counters() {
        let provider = InMemoryCacheProvider::new();
        assert_eq!(provider.counter("g").unwrap(), 0);
        assert_eq!(provider.increment("g").unwrap(), 1);
        assert_eq!(provider.increment("g").unwrap(), 2);
        assert_eq!(provider.counter("g").unwrap(), 2);
        assert_eq!(provider.counter("other").unwrap(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_atomic() {
        let provider = Arc::new(InMemoryCacheProvider::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    for _ in 0..100 {
                        provider.increment("g").expect("increment should succeed");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread should not panic");
        }
        assert_eq!(provider.counter("g").unwrap(), 800);
    }

    #[test]
    fn test_clear_resets_entries_and_counters() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", value(1), None).unwrap();
        provider.increment("g").unwrap();

        provider.clear().unwrap();
        assert!(provider.get("k").unwrap().is_none());
        assert_eq!(provider.counter("g").unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let provider = InMemoryCacheProvider::new();
        provider.set("k", value(1), None).unwrap();
        provider.get("k").unwrap();
        provider.get("k").unwrap();
        provider.get("nope").unwrap();

        let stats = provider.stats().unwrap();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }
}
