//! Query manager: the mediator between a repository and its strategy.
//!
//! Every repository read goes through one of the `execute_*` methods, which
//! consult the strategy first and only invoke the supplied query closure on
//! a miss. Every repository write is reported through the `on_*` methods so
//! the strategy can retire stale results.
//!
//! The manager owns exactly two pieces of state: whether caching is enabled,
//! and whether the most recent `execute_*` call was served from cache. Both
//! are atomics, so a shared manager can be read from several threads.
//! `cache_used` reflects the last call on *any* thread.
//!
//! # Example
//!
//! ```ignore
//! let manager = QueryManager::<Widget, u32>::from_config(&config, provider)?;
//!
//! let spec = Specification::new(Expr::member("kind").equal_to(Expr::constant(1)));
//! let widgets = manager.execute_find_all(&spec, &Selector::identity(), None, || {
//!     store.find_all(&spec)
//! })?;
//! assert!(!manager.cache_used());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use repocache_core::{
    CacheConfig, CacheableEntity, CompoundKey, EntityKey, KeyKind, QueryOptions, RepoCacheError,
    RepoCacheResult, Selector, Specification,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::query::{CachedQuery, QueryShape};
use super::strategy::{self, InvalidationStrategy, InvalidationStrategyExt, NoCacheStrategy};
use super::traits::CacheProvider;

/// Mediator between a repository and its invalidation strategy.
pub struct QueryManager<T, K> {
    strategy: Box<dyn InvalidationStrategy<T, K>>,
    cache_enabled: AtomicBool,
    cache_used: AtomicBool,
    key_shape: Option<Vec<KeyKind>>,
}

/// Manager for entities keyed by two values.
pub type QueryManager2<T, K1, K2> = QueryManager<T, (K1, K2)>;

/// Manager for entities keyed by three values.
pub type QueryManager3<T, K1, K2, K3> = QueryManager<T, (K1, K2, K3)>;

/// Manager for entities keyed by an untyped compound key; pair with
/// [`QueryManager::with_key_shape`].
pub type CompoundQueryManager<T> = QueryManager<T, CompoundKey>;

impl<T, K> QueryManager<T, K>
where
    T: CacheableEntity,
    K: EntityKey,
{
    /// Create a manager. `None` means no caching.
    pub fn new(strategy: Option<Box<dyn InvalidationStrategy<T, K>>>) -> Self {
        let strategy = strategy.unwrap_or_else(|| Box::new(NoCacheStrategy::new()));
        Self {
            strategy,
            cache_enabled: AtomicBool::new(true),
            cache_used: AtomicBool::new(false),
            key_shape: None,
        }
    }

    /// Create a manager around a concrete strategy.
    pub fn with_strategy<S>(strategy: S) -> Self
    where
        S: InvalidationStrategy<T, K> + 'static,
    {
        Self::new(Some(Box::new(strategy)))
    }

    /// Create a manager from configuration. The partitioned strategy needs
    /// a selector; build it with [`strategy::from_config_partitioned`] and
    /// pass it to [`QueryManager::new`].
    pub fn from_config(config: &CacheConfig, provider: Arc<dyn CacheProvider>) -> RepoCacheResult<Self> {
        let manager = Self::new(Some(strategy::from_config(config, provider)?));
        manager.set_cache_enabled(config.enabled);
        Ok(manager)
    }

    /// Declare the runtime shape of keys. Every key passed to this manager
    /// is checked against it before it reaches the strategy.
    pub fn with_key_shape(mut self, shape: Vec<KeyKind>) -> Self {
        self.key_shape = Some(shape);
        self
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::Acquire)
    }

    /// Enable or disable caching. While disabled, lookups always miss and
    /// mutations are not forwarded; call [`QueryManager::clear_cache`] on
    /// re-enable if writes happened in between.
    pub fn set_cache_enabled(&self, enabled: bool) {
        self.cache_enabled.store(enabled, Ordering::Release);
    }

    /// Whether the most recent `execute_*` call was served from cache.
    pub fn cache_used(&self) -> bool {
        self.cache_used.load(Ordering::Acquire)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Retire every cached entry of this repository.
    pub fn clear_cache(&self) -> RepoCacheResult<()> {
        debug!(strategy = self.strategy.name(), "clearing cache");
        self.strategy.clear_all()
    }

    fn check_key(&self, key: &K) -> RepoCacheResult<()> {
        match &self.key_shape {
            Some(shape) => key.check_shape(shape),
            None => Ok(()),
        }
    }

    /// Serve `query` from cache, or run it and cache the result.
    ///
    /// The slot is taken before `run` so a mutation that lands while it
    /// runs retires the result instead of being hidden by it.
    fn execute<R, E, F>(&self, query: CachedQuery<'_, K>, run: F) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<R, E>,
    {
        let slot = self.strategy.result_slot(&query)?;
        if let Some(slot) = slot.as_ref().filter(|_| self.cache_enabled()) {
            if let Some(cached) = self.strategy.try_typed_result::<R>(slot)? {
                self.cache_used.store(true, Ordering::Release);
                debug!(strategy = self.strategy.name(), shape = query.shape().name(), "cache hit");
                return Ok(cached);
            }
        }

        self.cache_used.store(false, Ordering::Release);
        debug!(strategy = self.strategy.name(), shape = query.shape().name(), "cache miss");
        let result = run()?;
        if let Some(slot) = &slot {
            self.strategy.save_typed_result(slot, &result)?;
        }
        Ok(result)
    }

    /// Get one entity by key.
    pub fn execute_get<E, F>(&self, key: &K, query: F) -> Result<Option<T>, E>
    where
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        self.check_key(key)?;
        self.execute(CachedQuery::get(key), query)
    }

    /// Get one entity by key, projected through `selector`.
    pub fn execute_get_with<R, E, F>(
        &self,
        key: &K,
        selector: &Selector<T, R>,
        query: F,
    ) -> Result<Option<R>, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Option<R>, E>,
    {
        self.check_key(key)?;
        self.execute(
            CachedQuery::get(key).with_selector(Some(selector.shape())),
            query,
        )
    }

    /// Get several entities by key, in key order.
    pub fn execute_get_many<R, E, F>(
        &self,
        keys: &[K],
        selector: &Selector<T, R>,
        query: F,
    ) -> Result<Vec<R>, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Vec<R>, E>,
    {
        for key in keys {
            self.check_key(key)?;
        }
        self.execute(
            CachedQuery::get_many(keys).with_selector(Some(selector.shape())),
            query,
        )
    }

    pub fn execute_get_all<R, E, F>(
        &self,
        selector: &Selector<T, R>,
        options: Option<&QueryOptions>,
        query: F,
    ) -> Result<Vec<R>, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Vec<R>, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::GetAll)
                .with_selector(Some(selector.shape()))
                .with_options(options),
            query,
        )
    }

    /// First entity matching `spec` in `options` order.
    pub fn execute_find<R, E, F>(
        &self,
        spec: &Specification<T>,
        selector: &Selector<T, R>,
        options: Option<&QueryOptions>,
        query: F,
    ) -> Result<Option<R>, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Option<R>, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::Find)
                .with_predicate(Some(spec.predicate()))
                .with_selector(Some(selector.shape()))
                .with_options(options),
            query,
        )
    }

    pub fn execute_find_all<R, E, F>(
        &self,
        spec: &Specification<T>,
        selector: &Selector<T, R>,
        options: Option<&QueryOptions>,
        query: F,
    ) -> Result<Vec<R>, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Vec<R>, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::FindAll)
                .with_predicate(Some(spec.predicate()))
                .with_selector(Some(selector.shape()))
                .with_options(options),
            query,
        )
    }

    pub fn execute_count<E, F>(&self, spec: Option<&Specification<T>>, query: F) -> Result<usize, E>
    where
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<usize, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::Count).with_predicate(spec.map(Specification::predicate)),
            query,
        )
    }

    pub fn execute_long_count<E, F>(&self, spec: Option<&Specification<T>>, query: F) -> Result<u64, E>
    where
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<u64, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::LongCount).with_predicate(spec.map(Specification::predicate)),
            query,
        )
    }

    /// Sum of `selector` over entities matching `spec`.
    pub fn execute_sum<S, R, E, F>(
        &self,
        spec: Option<&Specification<T>>,
        selector: &Selector<T, S>,
        query: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<R, E>,
    {
        self.execute_aggregate(QueryShape::Sum, spec, selector, query)
    }

    pub fn execute_average<S, R, E, F>(
        &self,
        spec: Option<&Specification<T>>,
        selector: &Selector<T, S>,
        query: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<R, E>,
    {
        self.execute_aggregate(QueryShape::Average, spec, selector, query)
    }

    pub fn execute_min<S, R, E, F>(
        &self,
        spec: Option<&Specification<T>>,
        selector: &Selector<T, S>,
        query: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<R, E>,
    {
        self.execute_aggregate(QueryShape::Min, spec, selector, query)
    }

    pub fn execute_max<S, R, E, F>(
        &self,
        spec: Option<&Specification<T>>,
        selector: &Selector<T, S>,
        query: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<R, E>,
    {
        self.execute_aggregate(QueryShape::Max, spec, selector, query)
    }

    fn execute_aggregate<S, R, E, F>(
        &self,
        shape: QueryShape,
        spec: Option<&Specification<T>>,
        selector: &Selector<T, S>,
        query: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<R, E>,
    {
        self.execute(
            CachedQuery::new(shape)
                .with_predicate(spec.map(Specification::predicate))
                .with_selector(Some(selector.shape())),
            query,
        )
    }

    /// Number of matching entities per group key.
    pub fn execute_group_counts<G, E, F>(
        &self,
        spec: Option<&Specification<T>>,
        group_by: &Selector<T, G>,
        query: F,
    ) -> Result<Vec<(G, usize)>, E>
    where
        G: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Vec<(G, usize)>, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::Group)
                .with_predicate(spec.map(Specification::predicate))
                .with_group_by(Some(group_by.shape())),
            query,
        )
    }

    /// Matching entities per group key, projected through `selector`.
    pub fn execute_group_items<G, R, E, F>(
        &self,
        spec: Option<&Specification<T>>,
        group_by: &Selector<T, G>,
        selector: &Selector<T, R>,
        query: F,
    ) -> Result<Vec<(G, Vec<R>)>, E>
    where
        G: Serialize + DeserializeOwned,
        R: Serialize + DeserializeOwned,
        E: From<RepoCacheError>,
        F: FnOnce() -> Result<Vec<(G, Vec<R>)>, E>,
    {
        self.execute(
            CachedQuery::new(QueryShape::Group)
                .with_predicate(spec.map(Specification::predicate))
                .with_group_by(Some(group_by.shape()))
                .with_selector(Some(selector.shape())),
            query,
        )
    }

    pub fn on_item_added(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.check_key(key)?;
        if self.cache_enabled() {
            self.strategy.add(key, entity)?;
        }
        Ok(())
    }

    pub fn on_item_updated(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.check_key(key)?;
        if self.cache_enabled() {
            self.strategy.update(key, entity)?;
        }
        Ok(())
    }

    pub fn on_item_deleted(&self, key: &K, entity: &T) -> RepoCacheResult<()> {
        self.check_key(key)?;
        if self.cache_enabled() {
            self.strategy.delete(key, entity)?;
        }
        Ok(())
    }

    pub fn on_save_executed(&self) -> RepoCacheResult<()> {
        if self.cache_enabled() {
            self.strategy.save()?;
        }
        Ok(())
    }
}

impl<T, K> std::fmt::Debug for QueryManager<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryManager")
            .field("strategy", &self.strategy.name())
            .field("cache_enabled", &self.cache_enabled.load(Ordering::Relaxed))
            .field("cache_used", &self.cache_used.load(Ordering::Relaxed))
            .field("key_shape", &self.key_shape)
            .finish()
    }
}
