//! Generational invalidation scoped by a partition member.
//!
//! Query results whose predicate pins the partition member to one value are
//! *confined*: they are stamped with that partition's generation and the
//! save generation. Everything else is *cross-partition* and stamped with
//! the repository-wide generation.
//!
//! | event                    | bumps                       |
//! |--------------------------|-----------------------------|
//! | add / delete of `e`      | `part(P(e))`, `all`         |
//! | update of `e`            | `part(P(e))`, `part(P(old))`, `all` |
//! | save                     | `save`, `all`               |
//! | clear_all                | `epoch`                     |
//!
//! A mutation in partition P1 therefore leaves results confined to P2
//! cached.

use std::marker::PhantomData;
use std::sync::Arc;

use repocache_core::{CacheableEntity, EntityKey, RepoCacheResult};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{
    epoch_stamp, store_result, InvalidationStrategy, KeyScope, ResultSlot, CROSS_PARTITION, UNSCOPED,
};
use crate::cache::cache_key::CacheKey;
use crate::cache::generation::{GenerationScope, GenerationStore};
use crate::cache::partition::{PartitionResolver, PartitionSelector, Resolution};
use crate::cache::query::CachedQuery;
use crate::cache::traits::{CacheProvider, CachedValue};

pub struct StandardPartitionedStrategy<T, K, P> {
    provider: Arc<dyn CacheProvider>,
    scope: KeyScope,
    generations: GenerationStore,
    partition: PartitionSelector<T, P>,
    _marker: PhantomData<fn(&K)>,
}

impl<T, K, P> StandardPartitionedStrategy<T, K, P>
where
    T: CacheableEntity,
    K: EntityKey,
    P: Serialize + DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        provider: Arc<dyn CacheProvider>,
        scope: KeyScope,
        partition: PartitionSelector<T, P>,
    ) -> Self {
        let generations = scope.generations(Arc::clone(&provider));
        Self {
            provider,
            scope,
            generations,
            partition,
            _marker: PhantomData,
        }
    }

    pub fn partition(&self) -> &PartitionSelector<T, P> {
        &self.partition
    }

    fn key(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<CacheKey> {
        if query.is_entity_get() {
            return self
                .scope
                .cache_key(query, &epoch_stamp(&self.generations)?, UNSCOPED);
        }

        let epoch = self.generations.current(&GenerationScope::Epoch)?;
        let resolution = match query.predicate() {
            Some(predicate) => PartitionResolver::try_resolve(predicate, &self.partition),
            None => Resolution::NotMatched,
        };
        match resolution {
            Resolution::Matched(value) => {
                let tag = partition_tag(&value)?;
                let stamp = format!(
                    "e{}.s{}.p{}",
                    epoch,
                    self.generations.current(&GenerationScope::Save)?,
                    self.generations
                        .current(&GenerationScope::Partition(tag.clone()))?
                );
                self.scope.cache_key(query, &stamp, &format!("p:{}", tag))
            }
            other => {
                if let Resolution::Unsupported(reason) = other {
                    debug!(
                        member = self.partition.member(),
                        reason = %reason,
                        "partition unresolved, caching as cross-partition"
                    );
                }
                let stamp = format!(
                    "e{}.g{}",
                    epoch,
                    self.generations.current(&GenerationScope::All)?
                );
                self.scope.cache_key(query, &stamp, CROSS_PARTITION)
            }
        }
    }

    fn entity_key(&self, key: &K) -> RepoCacheResult<CacheKey> {
        self.key(&CachedQuery::get(key))
    }

    fn bump_partition(&self, value: &P) -> RepoCacheResult<()> {
        self.generations
            .bump(&GenerationScope::Partition(partition_tag(value)?))?;
        Ok(())
    }

    fn bump_all(&self) -> RepoCacheResult<()> {
        self.generations.bump(&GenerationScope::All)?;
        Ok(())
    }
}

/// Rendered partition value, safe for use inside a key segment.
fn partition_tag<P: Serialize>(value: &P) -> RepoCacheResult<String> {
    let json = serde_json::to_string(value)?;
    Ok(json.replace('%', "%25").replace('/', "%2F"))
}

impl<T, K, P> InvalidationStrategy<T, K> for StandardPartitionedStrategy<T, K, P>
where
    T: CacheableEntity,
    K: EntityKey,
    P: Serialize + DeserializeOwned + PartialEq + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "standard-partitioned"
    }

    fn result_slot(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<Option<ResultSlot>> {
        Ok(Some(ResultSlot::new(self.key(query)?, query.is_entity_get())))
    }

    fn try_result(&self, slot: &ResultSlot) -> RepoCacheResult<Option<CachedValue>> {
        let found = self.provider.get(slot.key().as_str())?;
        debug!(strategy = "standard-partitioned", key = %slot.key(), hit = found.is_some(), "cache lookup");
        Ok(found)
    }

    fn save_result(&self, slot: &ResultSlot, value: CachedValue) -> RepoCacheResult<()> {
        debug!(strategy = "standard-partitioned", key = %slot.key(), bytes = value.len(), "cache save");
        store_result(self.provider.as_ref(), slot, value, None)
    }

    fn add(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        let entry = self.entity_key(key)?;
        self.provider
            .set(entry.as_str(), CachedValue::encode(entity)?, None)?;
        self.bump_partition(&self.partition.resolve(entity))?;
        self.bump_all()
    }

    fn update(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        let entry = self.entity_key(key)?;
        let previous = match self.provider.get(entry.as_str())? {
            Some(cached) => match cached.decode::<Option<T>>() {
                Ok(previous) => previous,
                Err(e) => {
                    debug!(key = %entry, error = %e, "previous entity does not decode");
                    None
                }
            },
            None => None,
        };
        self.provider
            .set(entry.as_str(), CachedValue::encode(entity)?, None)?;

        let current = self.partition.resolve(entity);
        self.bump_partition(&current)?;
        match previous.map(|old| self.partition.resolve(&old)) {
            Some(old) if old == current => {}
            Some(old) => self.bump_partition(&old)?,
            None => {
                // The entity may have left a partition we cannot name.
                debug!(
                    member = self.partition.member(),
                    "previous partition unknown, retiring all confined results"
                );
                self.generations.bump(&GenerationScope::Save)?;
            }
        }
        self.bump_all()
    }

    fn delete(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        let entry = self.entity_key(key)?;
        self.provider.set(entry.as_str(), CachedValue::none(), None)?;
        self.bump_partition(&self.partition.resolve(entity))?;
        self.bump_all()
    }

    fn save(&self) -> RepoCacheResult<()> {
        self.generations.bump(&GenerationScope::Save)?;
        self.bump_all()
    }

    fn clear_all(&self) -> RepoCacheResult<()> {
        self.generations.bump(&GenerationScope::Epoch)?;
        Ok(())
    }
}
