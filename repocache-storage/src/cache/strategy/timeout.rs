//! Absolute-expiry caching without generational invalidation.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use repocache_core::{CacheableEntity, EntityKey, RepoCacheResult};
use tracing::debug;

use super::{epoch_stamp, store_result, InvalidationStrategy, KeyScope, ResultSlot, UNSCOPED};
use crate::cache::cache_key::CacheKey;
use crate::cache::generation::{GenerationScope, GenerationStore};
use crate::cache::query::CachedQuery;
use crate::cache::traits::{CacheProvider, CachedValue};

/// Every entry expires `ttl` after it was written. Mutations do not retire
/// query results; a result may be stale for up to `ttl`. Get-by-key entries
/// are still written through on add, update and delete.
pub struct TimeoutStrategy<T, K> {
    provider: Arc<dyn CacheProvider>,
    scope: KeyScope,
    generations: GenerationStore,
    ttl: Duration,
    _marker: PhantomData<fn(&T, &K)>,
}

impl<T, K> TimeoutStrategy<T, K>
where
    T: CacheableEntity,
    K: EntityKey,
{
    pub fn new(provider: Arc<dyn CacheProvider>, scope: KeyScope, ttl: Duration) -> Self {
        let generations = scope.generations(Arc::clone(&provider));
        Self {
            provider,
            scope,
            generations,
            ttl,
            _marker: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<CacheKey> {
        // Only the epoch is stamped, so clear_all still works.
        self.scope
            .cache_key(query, &epoch_stamp(&self.generations)?, UNSCOPED)
    }

    fn write_through(&self, key: &K, value: CachedValue) -> RepoCacheResult<()> {
        let entry = self.key(&CachedQuery::get(key))?;
        debug!(strategy = "timeout", key = %entry, "write-through");
        self.provider.set(entry.as_str(), value, Some(self.ttl))
    }
}

impl<T, K> InvalidationStrategy<T, K> for TimeoutStrategy<T, K>
where
    T: CacheableEntity,
    K: EntityKey,
{
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn result_slot(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<Option<ResultSlot>> {
        Ok(Some(ResultSlot::new(self.key(query)?, query.is_entity_get())))
    }

    fn try_result(&self, slot: &ResultSlot) -> RepoCacheResult<Option<CachedValue>> {
        let found = self.provider.get(slot.key().as_str())?;
        debug!(strategy = "timeout", key = %slot.key(), hit = found.is_some(), "cache lookup");
        Ok(found)
    }

    fn save_result(&self, slot: &ResultSlot, value: CachedValue) -> RepoCacheResult<()> {
        debug!(strategy = "timeout", key = %slot.key(), ttl_secs = self.ttl.as_secs(), "cache save");
        store_result(self.provider.as_ref(), slot, value, Some(self.ttl))
    }

    fn add(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.write_through(key, CachedValue::encode(entity)?)
    }

    fn update(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.write_through(key, CachedValue::encode(entity)?)
    }

    fn delete(&self, key: &K, _entity: &T) -> RepoCacheResult<()> {
        self.write_through(key, CachedValue::none())
    }

    fn save(&self) -> RepoCacheResult<()> {
        Ok(())
    }

    fn clear_all(&self) -> RepoCacheResult<()> {
        self.generations.bump(&GenerationScope::Epoch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_backend::InMemoryCacheProvider;
    use crate::cache::query::QueryShape;
    use crate::cache::strategy::test_support::{fetch, is_cached, store, Part};
    use crate::cache::strategy::InvalidationStrategyExt;
    use std::thread;

    fn strategy(ttl: Duration) -> TimeoutStrategy<Part, u32> {
        TimeoutStrategy::new(
            Arc::new(InMemoryCacheProvider::new()),
            KeyScope::for_entity::<Part>("test"),
            ttl,
        )
    }

    #[test]
    fn test_results_survive_mutations_until_expiry() {
        let strategy = strategy(Duration::from_millis(80));
        let query = CachedQuery::<u32>::new(QueryShape::Count);
        store(&strategy, &query, &1u64);

        strategy.add(&2, &Part::new(2, 1, "b")).unwrap();
        strategy.save().unwrap();
        assert_eq!(fetch::<Part, _, u64>(&strategy, &query), Some(1));

        thread::sleep(Duration::from_millis(150));
        assert!(!is_cached(&strategy, &query));
    }

    #[test]
    fn test_get_entries_written_through_with_ttl() {
        let strategy = strategy(Duration::from_millis(80));
        let part = Part::new(1, 1, "a");
        strategy.add(&1, &part).unwrap();
        assert_eq!(strategy.try_get_result(&1).unwrap(), Some(part.clone()));

        strategy.delete(&1, &part).unwrap();
        assert!(strategy.try_get_result(&1).unwrap().is_none());

        strategy.update(&1, &part).unwrap();
        thread::sleep(Duration::from_millis(150));
        assert!(strategy.try_get_result(&1).unwrap().is_none());
    }

    #[test]
    fn test_clear_all() {
        let strategy = strategy(Duration::from_secs(60));
        let query = CachedQuery::<u32>::new(QueryShape::GetAll);
        store(&strategy, &query, &Vec::<Part>::new());
        strategy.clear_all().unwrap();
        assert!(!is_cached(&strategy, &query));
        assert_eq!(strategy.ttl(), Duration::from_secs(60));
    }
}
