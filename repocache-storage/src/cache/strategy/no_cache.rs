//! Strategy that never caches.

use std::marker::PhantomData;

use repocache_core::RepoCacheResult;

use super::{InvalidationStrategy, ResultSlot};
use crate::cache::query::CachedQuery;
use crate::cache::traits::CachedValue;

/// Every lookup misses and every other operation is a no-op.
pub struct NoCacheStrategy<T, K> {
    _marker: PhantomData<fn(&T, &K)>,
}

impl<T, K> NoCacheStrategy<T, K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, K> Default for NoCacheStrategy<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> InvalidationStrategy<T, K> for NoCacheStrategy<T, K> {
    fn name(&self) -> &'static str {
        "no-cache"
    }

    fn result_slot(&self, _query: &CachedQuery<'_, K>) -> RepoCacheResult<Option<ResultSlot>> {
        Ok(None)
    }

    fn try_result(&self, _slot: &ResultSlot) -> RepoCacheResult<Option<CachedValue>> {
        Ok(None)
    }

    fn save_result(&self, _slot: &ResultSlot, _value: CachedValue) -> RepoCacheResult<()> {
        Ok(())
    }

    fn add(&self, _key: &K, _entity: &T) -> RepoCacheResult<()> {
        Ok(())
    }

    fn update(&self, _key: &K, _entity: &T) -> RepoCacheResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &K, _entity: &T) -> RepoCacheResult<()> {
        Ok(())
    }

    fn save(&self) -> RepoCacheResult<()> {
        Ok(())
    }

    fn clear_all(&self) -> RepoCacheResult<()> {
        Ok(())
    }
}
