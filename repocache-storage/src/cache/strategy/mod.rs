//! Invalidation strategies.
//!
//! A strategy decides which key a query result lives under and how
//! mutations retire stale results. Every strategy implements the same
//! object-safe [`InvalidationStrategy`] contract over serialized
//! [`CachedValue`]s; typed access goes through [`InvalidationStrategyExt`].
//!
//! | strategy                | retirement                                   |
//! |-------------------------|----------------------------------------------|
//! | [`NoCacheStrategy`]     | nothing is ever cached                       |
//! | [`TimeoutStrategy`]     | absolute expiry only                         |
//! | [`StandardStrategy`]    | one generation per repository                |
//! | [`StandardPartitionedStrategy`] | one generation per partition value   |
//!
//! Get-by-key entries are kept current on mutation by write-through, so
//! they survive generation bumps; a delete leaves a `None` entry behind.
//! All other query results are stamped with the generations in force when
//! their [`ResultSlot`] was taken, before the query ran.

mod no_cache;
mod partitioned;
mod standard;
mod timeout;

pub use no_cache::NoCacheStrategy;
pub use partitioned::StandardPartitionedStrategy;
pub use standard::StandardStrategy;
pub use timeout::TimeoutStrategy;

use std::sync::Arc;
use std::time::Duration;

use repocache_core::{
    CacheConfig, CacheableEntity, ConfigError, EntityKey, RepoCacheResult, StrategyConfig,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::cache_key::{CacheKey, KeyCodec};
use super::generation::{GenerationScope, GenerationStore};
use super::partition::PartitionSelector;
use super::query::CachedQuery;
use super::traits::{CacheProvider, CachedValue};

/// Partition segment for entries that are not partition-scoped.
pub const UNSCOPED: &str = "-";

/// Partition segment for results that may span partitions.
pub const CROSS_PARTITION: &str = "*";

/// Where one query result is stored.
///
/// A slot is taken before the query runs and the result is saved under it
/// unchanged. A mutation landing while the query runs bumps a generation
/// the slot does not carry, so the result is stored where it is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSlot {
    key: CacheKey,
    write_through: bool,
}

impl ResultSlot {
    pub fn new(key: CacheKey, write_through: bool) -> Self {
        Self { key, write_through }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// True for the get-by-key entry that mutations keep current.
    pub fn is_write_through(&self) -> bool {
        self.write_through
    }
}

/// Caching policy for one repository.
///
/// Implementations must be thread-safe; all shared state lives in the
/// cache provider.
pub trait InvalidationStrategy<T, K>: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Fix the slot a result of `query` lives in, reading the generations
    /// in force now. `None` if this strategy never caches.
    fn result_slot(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<Option<ResultSlot>>;

    /// Look up the cached result in `slot`.
    fn try_result(&self, slot: &ResultSlot) -> RepoCacheResult<Option<CachedValue>>;

    /// Store a result computed after `slot` was taken.
    fn save_result(&self, slot: &ResultSlot, value: CachedValue) -> RepoCacheResult<()>;

    /// An entity was added under `key`.
    fn add(&self, key: &K, entity: &T) -> RepoCacheResult<()>;

    /// The entity under `key` was replaced by `entity`.
    fn update(&self, key: &K, entity: &T) -> RepoCacheResult<()>;

    /// `entity` was deleted from under `key`.
    fn delete(&self, key: &K, entity: &T) -> RepoCacheResult<()>;

    /// A unit of work was committed.
    fn save(&self) -> RepoCacheResult<()>;

    /// Retire every entry this strategy has written.
    fn clear_all(&self) -> RepoCacheResult<()>;
}

/// Typed access on top of [`InvalidationStrategy`].
pub trait InvalidationStrategyExt<T, K>: InvalidationStrategy<T, K> {
    /// Look up and decode a cached result. A payload that no longer decodes
    /// as `R` is reported as a miss.
    fn try_typed_result<R: DeserializeOwned>(&self, slot: &ResultSlot) -> RepoCacheResult<Option<R>> {
        let Some(cached) = self.try_result(slot)? else {
            return Ok(None);
        };
        match cached.decode::<R>() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(strategy = self.name(), key = %slot.key(), error = %e, "discarding undecodable cached result");
                Ok(None)
            }
        }
    }

    /// Encode and store a result.
    fn save_typed_result<R: Serialize>(&self, slot: &ResultSlot, result: &R) -> RepoCacheResult<()> {
        self.save_result(slot, CachedValue::encode(result)?)
    }

    /// Cached entity for a get-by-key. A deleted entity reads as `None`.
    fn try_get_result(&self, key: &K) -> RepoCacheResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.result_slot(&CachedQuery::get(key))? {
            Some(slot) => Ok(self.try_typed_result::<Option<T>>(&slot)?.flatten()),
            None => Ok(None),
        }
    }
}

impl<T, K, S> InvalidationStrategyExt<T, K> for S where S: InvalidationStrategy<T, K> + ?Sized {}

/// Write a query result into its slot. A write-through slot is only filled
/// when vacant: an entry written there by a mutation while the query ran is
/// newer than the result.
pub(crate) fn store_result(
    provider: &dyn CacheProvider,
    slot: &ResultSlot,
    value: CachedValue,
    ttl: Option<Duration>,
) -> RepoCacheResult<()> {
    if slot.is_write_through() {
        provider.set_if_absent(slot.key().as_str(), value, ttl)?;
        Ok(())
    } else {
        provider.set(slot.key().as_str(), value, ttl)
    }
}

/// Where one repository's keys live: `{prefix}/{type}` plus the codec that
/// fingerprints queries.
#[derive(Debug, Clone)]
pub struct KeyScope {
    prefix: String,
    type_name: String,
    codec: KeyCodec,
}

impl KeyScope {
    pub fn new(prefix: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            type_name: type_name.into(),
            codec: KeyCodec::default(),
        }
    }

    /// Scope for entity type `T`.
    pub fn for_entity<T: CacheableEntity>(prefix: impl Into<String>) -> Self {
        Self::new(prefix, T::type_name())
    }

    /// Scope for entity type `T` with the prefix and codec settings of
    /// `config`.
    pub fn from_config<T: CacheableEntity>(config: &CacheConfig) -> Self {
        Self::for_entity::<T>(config.prefix.clone()).with_codec(
            KeyCodec::new().with_collection_hash_threshold(config.collection_hash_threshold),
        )
    }

    pub fn with_codec(mut self, codec: KeyCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// `{prefix}/{type}`
    pub fn scope(&self) -> String {
        format!("{}/{}", self.prefix, self.type_name)
    }

    /// Generation counters living under this scope.
    pub fn generations(&self, provider: Arc<dyn CacheProvider>) -> GenerationStore {
        GenerationStore::new(provider, &self.scope())
    }

    /// Build the key for `query` with the given stamp and partition segment.
    pub fn cache_key<K: EntityKey>(
        &self,
        query: &CachedQuery<'_, K>,
        stamp: &str,
        partition: &str,
    ) -> RepoCacheResult<CacheKey> {
        let fingerprint = self.codec.fingerprint(query)?;
        Ok(CacheKey::new(
            &self.prefix,
            &self.type_name,
            query.shape().name(),
            stamp,
            partition,
            fingerprint,
        ))
    }
}

/// Stamp for entries that only a bulk clear retires.
pub(crate) fn epoch_stamp(generations: &GenerationStore) -> RepoCacheResult<String> {
    Ok(format!("e{}", generations.current(&GenerationScope::Epoch)?))
}

/// Build the strategy named by `config`.
///
/// The partitioned strategy needs a partition selector; use
/// [`from_config_partitioned`] for it.
pub fn from_config<T, K>(
    config: &CacheConfig,
    provider: Arc<dyn CacheProvider>,
) -> RepoCacheResult<Box<dyn InvalidationStrategy<T, K>>>
where
    T: CacheableEntity,
    K: EntityKey,
{
    config.validate()?;
    let scope = KeyScope::from_config::<T>(config);
    let strategy: Box<dyn InvalidationStrategy<T, K>> = match &config.strategy {
        StrategyConfig::NoCache => Box::new(NoCacheStrategy::new()),
        StrategyConfig::Timeout { ttl_secs } => Box::new(TimeoutStrategy::new(
            provider,
            scope,
            Duration::from_secs(*ttl_secs),
        )),
        StrategyConfig::Standard => Box::new(StandardStrategy::new(provider, scope)),
        StrategyConfig::StandardPartitioned => {
            return Err(ConfigError::MissingRequired {
                field: "partition".to_string(),
            }
            .into());
        }
    };
    Ok(strategy)
}

/// Build the strategy named by `config`, using `partition` when it names
/// the partitioned strategy.
pub fn from_config_partitioned<T, K, P>(
    config: &CacheConfig,
    provider: Arc<dyn CacheProvider>,
    partition: PartitionSelector<T, P>,
) -> RepoCacheResult<Box<dyn InvalidationStrategy<T, K>>>
where
    T: CacheableEntity,
    K: EntityKey,
    P: Serialize + DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    match config.strategy {
        StrategyConfig::StandardPartitioned => {
            config.validate()?;
            let scope = KeyScope::from_config::<T>(config);
            Ok(Box::new(StandardPartitionedStrategy::new(provider, scope, partition)))
        }
        _ => from_config(config, provider),
    }
}
