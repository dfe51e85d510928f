//! Generational invalidation with one counter per repository.

use std::marker::PhantomData;
use std::sync::Arc;

use repocache_core::{CacheableEntity, EntityKey, RepoCacheResult};
use tracing::debug;

use super::{epoch_stamp, store_result, InvalidationStrategy, KeyScope, ResultSlot, UNSCOPED};
use crate::cache::cache_key::CacheKey;
use crate::cache::generation::{GenerationScope, GenerationStore};
use crate::cache::query::CachedQuery;
use crate::cache::traits::{CacheProvider, CachedValue};

/// Every add, update, delete and save bumps the repository generation,
/// retiring all cached query results at once. Get-by-key entries are
/// written through on add, update and delete.
pub struct StandardStrategy<T, K> {
    provider: Arc<dyn CacheProvider>,
    scope: KeyScope,
    generations: GenerationStore,
    _marker: PhantomData<fn(&T, &K)>,
}

impl<T, K> StandardStrategy<T, K>
where
    T: CacheableEntity,
    K: EntityKey,
{
    pub fn new(provider: Arc<dyn CacheProvider>, scope: KeyScope) -> Self {
        let generations = scope.generations(Arc::clone(&provider));
        Self {
            provider,
            scope,
            generations,
            _marker: PhantomData,
        }
    }

    fn key(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<CacheKey> {
        let stamp = if query.is_entity_get() {
            epoch_stamp(&self.generations)?
        } else {
            format!(
                "e{}.g{}",
                self.generations.current(&GenerationScope::Epoch)?,
                self.generations.current(&GenerationScope::All)?
            )
        };
        self.scope.cache_key(query, &stamp, UNSCOPED)
    }

    fn write_through(&self, key: &K, value: CachedValue) -> RepoCacheResult<()> {
        let entry = self.key(&CachedQuery::get(key))?;
        debug!(strategy = "standard", key = %entry, "write-through");
        self.provider.set(entry.as_str(), value, None)
    }

    fn invalidate(&self) -> RepoCacheResult<()> {
        self.generations.bump(&GenerationScope::All)?;
        Ok(())
    }
}

impl<T, K> InvalidationStrategy<T, K> for StandardStrategy<T, K>
where
    T: CacheableEntity,
    K: EntityKey,
{
    fn name(&self) -> &'static str {
        "standard"
    }

    fn result_slot(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<Option<ResultSlot>> {
        Ok(Some(ResultSlot::new(self.key(query)?, query.is_entity_get())))
    }

    fn try_result(&self, slot: &ResultSlot) -> RepoCacheResult<Option<CachedValue>> {
        let found = self.provider.get(slot.key().as_str())?;
        debug!(strategy = "standard", key = %slot.key(), hit = found.is_some(), "cache lookup");
        Ok(found)
    }

    fn save_result(&self, slot: &ResultSlot, value: CachedValue) -> RepoCacheResult<()> {
        debug!(strategy = "standard", key = %slot.key(), bytes = value.len(), "cache save");
        store_result(self.provider.as_ref(), slot, value, None)
    }

    fn add(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.write_through(key, CachedValue::encode(entity)?)?;
        self.invalidate()
    }

    fn update(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.write_through(key, CachedValue::encode(entity)?)?;
        self.invalidate()
    }

    fn delete(&self, key: &K, _entity: &T) -> RepoCacheResult<()> {
        self.write_through(key, CachedValue::none())?;
        self.invalidate()
    }

    fn save(&self) -> RepoCacheResult<()> {
        self.invalidate()
    }

    fn clear_all(&self) -> RepoCacheResult<()> {
        self.generations.bump(&GenerationScope::Epoch)?;
        Ok(())
    }
}
