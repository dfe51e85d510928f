//! Generation counters for cache invalidation.
//!
//! A generation is a monotonically increasing counter stored in the cache
//! provider. Cache keys embed the generations they were written under, so
//! bumping a counter retires every entry that embedded it without scanning
//! the store. Retired entries become unreachable and are left to the
//! provider's eviction.
//!
//! Counters for one repository live under `{prefix}/{type}/@gen/`:
//!
//! | scope            | bumped by                                  |
//! |------------------|--------------------------------------------|
//! | `epoch`          | `clear_all`                                |
//! | `all`            | every mutation and save                    |
//! | `save`           | save (partitioned strategy)                |
//! | `part/{value}`   | mutations of entities in that partition    |

use std::fmt;
use std::sync::Arc;

use repocache_core::RepoCacheResult;
use tracing::debug;

use super::traits::CacheProvider;

/// A point in a counter's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The generation of a counter that was never bumped.
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Check if this generation is newer than another.
    pub fn is_newer_than(&self, other: &Generation) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which counter a bump or read applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenerationScope {
    Epoch,
    All,
    Save,
    /// Per-partition counter, keyed by the partition's rendered value.
    Partition(String),
}

impl GenerationScope {
    fn segment(&self) -> String {
        match self {
            GenerationScope::Epoch => "epoch".to_string(),
            GenerationScope::All => "all".to_string(),
            GenerationScope::Save => "save".to_string(),
            GenerationScope::Partition(tag) => format!("part/{}", tag),
        }
    }
}

/// Reads and bumps one repository's generation counters.
#[derive(Clone)]
pub struct GenerationStore {
    provider: Arc<dyn CacheProvider>,
    namespace: String,
}

impl GenerationStore {
    pub fn new(provider: Arc<dyn CacheProvider>, scope: &str) -> Self {
        Self {
            provider,
            namespace: format!("{}/@gen", scope),
        }
    }

    /// Provider key holding the counter for `scope`.
    pub fn key(&self, scope: &GenerationScope) -> String {
        format!("{}/{}", self.namespace, scope.segment())
    }

    /// Current generation. Never-bumped counters read as zero.
    pub fn current(&self, scope: &GenerationScope) -> RepoCacheResult<Generation> {
        Ok(Generation(self.provider.counter(&self.key(scope))?))
    }

    /// Atomically advance a counter, retiring every key stamped with its
    /// previous value.
    pub fn bump(&self, scope: &GenerationScope) -> RepoCacheResult<Generation> {
        let key = self.key(scope);
        let next = Generation(self.provider.increment(&key)?);
        debug!(counter = %key, generation = next.0, "generation bumped");
        Ok(next)
    }
}

impl fmt::Debug for GenerationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
