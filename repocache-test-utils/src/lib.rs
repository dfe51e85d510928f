//! repocache Test Utilities
//!
//! Shared test infrastructure for the repocache workspace:
//! - An in-memory repository that drives a `QueryManager` the way a real
//!   repository would
//! - A mock cache provider that can be switched into a failing state
//! - Proptest generators for expressions and entities
//! - Fixtures for common caching scenarios
//! - Assertions for cache hits and repocache errors

pub use repocache_core::{
    CacheConfig, CacheableEntity, CompoundKey, EntityKey, Expr, KeyKind, QueryOptions, Record,
    RepoCacheError, RepoCacheResult, Selector, Specification, StrategyConfig,
};
pub use repocache_storage::{
    CacheProvider, CachedValue, InMemoryCacheProvider, PartitionSelector, QueryManager,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use repocache_core::ProviderError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// TEST ENTITIES
// ============================================================================

/// Catalogue entry keyed by `id` and partitioned by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: u32,
    pub kind: i32,
    pub name: String,
    pub price: f64,
}

impl CacheableEntity for Widget {
    fn type_name() -> &'static str {
        "Widget"
    }
}

impl Record for Widget {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "id" => Some(json!(self.id)),
            "kind" => Some(json!(self.kind)),
            "name" => Some(json!(self.name)),
            "price" => Some(json!(self.price)),
            _ => None,
        }
    }
}

/// Order line keyed by `(order_id, line)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub order_id: Uuid,
    pub line: u32,
    pub sku: String,
    pub quantity: u32,
}

impl CacheableEntity for LineItem {
    fn type_name() -> &'static str {
        "LineItem"
    }
}

impl Record for LineItem {
    fn field(&self, path: &str) -> Option<Value> {
        match path {
            "order_id" => Some(json!(self.order_id)),
            "line" => Some(json!(self.line)),
            "sku" => Some(json!(self.sku)),
            "quantity" => Some(json!(self.quantity)),
            _ => None,
        }
    }
}

// ============================================================================
// MOCK PROVIDER
// ============================================================================

/// Cache provider that can be taken down mid-test.
///
/// While down, every call fails with `ProviderError::Unavailable`; otherwise
/// calls go to an inner [`InMemoryCacheProvider`].
#[derive(Debug, Default)]
pub struct FlakyCacheProvider {
    inner: InMemoryCacheProvider,
    down: AtomicBool,
}

impl FlakyCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        info!(down, "flaky cache provider availability changed");
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> RepoCacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            warn!("flaky cache provider rejected a call");
            return Err(ProviderError::Unavailable {
                reason: "provider taken down by test".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl CacheProvider for FlakyCacheProvider {
    fn exists(&self, key: &str) -> RepoCacheResult<bool> {
        self.check()?;
        self.inner.exists(key)
    }

    fn get(&self, key: &str) -> RepoCacheResult<Option<CachedValue>> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: CachedValue, ttl: Option<Duration>) -> RepoCacheResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl)
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: CachedValue,
        ttl: Option<Duration>,
    ) -> RepoCacheResult<bool> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl)
    }

    fn remove(&self, key: &str) -> RepoCacheResult<()> {
        self.check()?;
        self.inner.remove(key)
    }

    fn counter(&self, key: &str) -> RepoCacheResult<u64> {
        self.check()?;
        self.inner.counter(key)
    }

    fn increment(&self, key: &str) -> RepoCacheResult<u64> {
        self.check()?;
        self.inner.increment(key)
    }

    fn clear(&self) -> RepoCacheResult<()> {
        self.check()?;
        self.inner.clear()
    }
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

/// Errors raised by [`InMemoryRepository`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("No entity with key {key}")]
    NotFound { key: String },

    #[error("An entity with key {key} already exists")]
    Duplicate { key: String },

    #[error("Repository lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Cache(#[from] RepoCacheError),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository over a `Vec`, caching every read through a [`QueryManager`].
///
/// `executions` counts how many times the backing store was actually
/// queried, so tests can tell a cache hit from a miss without relying on
/// `cache_used` alone.
pub struct InMemoryRepository<T, K> {
    items: RwLock<Vec<T>>,
    key_of: Arc<dyn Fn(&T) -> K + Send + Sync>,
    cache: QueryManager<T, K>,
    executions: AtomicUsize,
}

impl<T, K> InMemoryRepository<T, K>
where
    T: CacheableEntity + Record,
    K: EntityKey,
{
    pub fn new<F>(cache: QueryManager<T, K>, key_of: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            items: RwLock::new(Vec::new()),
            key_of: Arc::new(key_of),
            cache,
            executions: AtomicUsize::new(0),
        }
    }

    pub fn cache(&self) -> &QueryManager<T, K> {
        &self.cache
    }

    /// Number of times the backing store was queried.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    fn key_text(&self, entity: &T) -> String {
        (self.key_of)(entity).key_text()
    }

    fn snapshot(&self) -> RepositoryResult<Vec<T>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let items = self.items.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(items.clone())
    }

    fn matching(&self, spec: Option<&Specification<T>>) -> RepositoryResult<Vec<T>> {
        let mut out = Vec::new();
        for item in self.snapshot()? {
            let keep = match spec {
                Some(spec) => spec.is_satisfied_by(&item)?,
                None => true,
            };
            if keep {
                out.push(item);
            }
        }
        Ok(out)
    }

    pub fn add(&self, entity: T) -> RepositoryResult<()> {
        let key = (self.key_of)(&entity);
        {
            let mut items = self.items.write().map_err(|_| RepositoryError::LockPoisoned)?;
            let text = key.key_text();
            if items.iter().any(|item| self.key_text(item) == text) {
                return Err(RepositoryError::Duplicate { key: text });
            }
            items.push(entity.clone());
        }
        self.cache.on_item_added(&key, &entity)?;
        Ok(())
    }

    pub fn update(&self, entity: T) -> RepositoryResult<()> {
        let key = (self.key_of)(&entity);
        {
            let mut items = self.items.write().map_err(|_| RepositoryError::LockPoisoned)?;
            let text = key.key_text();
            let slot = items
                .iter_mut()
                .find(|item| self.key_text(item) == text)
                .ok_or(RepositoryError::NotFound { key: text })?;
            *slot = entity.clone();
        }
        self.cache.on_item_updated(&key, &entity)?;
        Ok(())
    }

    pub fn delete(&self, key: &K) -> RepositoryResult<T> {
        let removed = {
            let mut items = self.items.write().map_err(|_| RepositoryError::LockPoisoned)?;
            let text = key.key_text();
            let index = items
                .iter()
                .position(|item| self.key_text(item) == text)
                .ok_or(RepositoryError::NotFound { key: text })?;
            items.remove(index)
        };
        self.cache.on_item_deleted(key, &removed)?;
        Ok(removed)
    }

    /// Commit point of a unit of work.
    pub fn save(&self) -> RepositoryResult<()> {
        self.cache.on_save_executed()?;
        Ok(())
    }

    pub fn get(&self, key: &K) -> RepositoryResult<Option<T>> {
        self.cache.execute_get(key, || {
            let text = key.key_text();
            Ok(self
                .snapshot()?
                .into_iter()
                .find(|item| self.key_text(item) == text))
        })
    }

    pub fn get_with<R>(&self, key: &K, selector: &Selector<T, R>) -> RepositoryResult<Option<R>>
    where
        R: Serialize + DeserializeOwned,
    {
        self.cache.execute_get_with(key, selector, || {
            let text = key.key_text();
            Ok(self
                .snapshot()?
                .iter()
                .find(|item| self.key_text(item) == text)
                .map(|item| selector.apply(item)))
        })
    }

    /// Entities for `keys`, in key order; missing keys are skipped.
    pub fn get_many<R>(&self, keys: &[K], selector: &Selector<T, R>) -> RepositoryResult<Vec<R>>
    where
        R: Serialize + DeserializeOwned,
    {
        self.cache.execute_get_many(keys, selector, || {
            let items = self.snapshot()?;
            Ok(keys
                .iter()
                .filter_map(|key| {
                    let text = key.key_text();
                    items.iter().find(|item| self.key_text(item) == text)
                })
                .map(|item| selector.apply(item))
                .collect())
        })
    }

    pub fn get_all(&self, options: Option<&QueryOptions>) -> RepositoryResult<Vec<T>> {
        self.get_all_with(&Selector::identity(), options)
    }

    pub fn get_all_with<R>(
        &self,
        selector: &Selector<T, R>,
        options: Option<&QueryOptions>,
    ) -> RepositoryResult<Vec<R>>
    where
        R: Serialize + DeserializeOwned,
    {
        self.cache.execute_get_all(selector, options, || {
            let items = self.snapshot()?;
            Ok(ordered(items, options).iter().map(|item| selector.apply(item)).collect())
        })
    }

    pub fn find(&self, spec: &Specification<T>, options: Option<&QueryOptions>) -> RepositoryResult<Option<T>> {
        self.cache
            .execute_find(spec, &Selector::identity(), options, || {
                Ok(ordered(self.matching(Some(spec))?, options).into_iter().next())
            })
    }

    pub fn find_all(&self, spec: &Specification<T>, options: Option<&QueryOptions>) -> RepositoryResult<Vec<T>> {
        self.find_all_with(spec, &Selector::identity(), options)
    }

    pub fn find_all_with<R>(
        &self,
        spec: &Specification<T>,
        selector: &Selector<T, R>,
        options: Option<&QueryOptions>,
    ) -> RepositoryResult<Vec<R>>
    where
        R: Serialize + DeserializeOwned,
    {
        self.cache.execute_find_all(spec, selector, options, || {
            let items = ordered(self.matching(Some(spec))?, options);
            Ok(items.iter().map(|item| selector.apply(item)).collect())
        })
    }

    pub fn count(&self, spec: Option<&Specification<T>>) -> RepositoryResult<usize> {
        self.cache
            .execute_count(spec, || Ok(self.matching(spec)?.len()))
    }

    pub fn long_count(&self, spec: Option<&Specification<T>>) -> RepositoryResult<u64> {
        self.cache
            .execute_long_count(spec, || Ok(self.matching(spec)?.len() as u64))
    }

    pub fn sum(&self, spec: Option<&Specification<T>>, selector: &Selector<T, f64>) -> RepositoryResult<f64> {
        self.cache.execute_sum(spec, selector, || {
            Ok(self.matching(spec)?.iter().map(|item| selector.apply(item)).sum())
        })
    }

    /// Mean of `selector`; `None` when nothing matches.
    pub fn average(
        &self,
        spec: Option<&Specification<T>>,
        selector: &Selector<T, f64>,
    ) -> RepositoryResult<Option<f64>> {
        self.cache.execute_average(spec, selector, || {
            let values: Vec<f64> = self.matching(spec)?.iter().map(|item| selector.apply(item)).collect();
            if values.is_empty() {
                return Ok(None);
            }
            Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
        })
    }

    pub fn min(&self, spec: Option<&Specification<T>>, selector: &Selector<T, f64>) -> RepositoryResult<Option<f64>> {
        self.cache.execute_min(spec, selector, || {
            Ok(self
                .matching(spec)?
                .iter()
                .map(|item| selector.apply(item))
                .reduce(f64::min))
        })
    }

    pub fn max(&self, spec: Option<&Specification<T>>, selector: &Selector<T, f64>) -> RepositoryResult<Option<f64>> {
        self.cache.execute_max(spec, selector, || {
            Ok(self
                .matching(spec)?
                .iter()
                .map(|item| selector.apply(item))
                .reduce(f64::max))
        })
    }

    /// Count per group key, in key order.
    pub fn group_counts<G>(
        &self,
        spec: Option<&Specification<T>>,
        group_by: &Selector<T, G>,
    ) -> RepositoryResult<Vec<(G, usize)>>
    where
        G: Ord + Serialize + DeserializeOwned,
    {
        self.cache.execute_group_counts(spec, group_by, || {
            let mut groups: BTreeMap<G, usize> = BTreeMap::new();
            for item in self.matching(spec)? {
                *groups.entry(group_by.apply(&item)).or_default() += 1;
            }
            Ok(groups.into_iter().collect())
        })
    }

    /// Projected items per group key, in key order.
    pub fn group_items<G, R>(
        &self,
        spec: Option<&Specification<T>>,
        group_by: &Selector<T, G>,
        selector: &Selector<T, R>,
    ) -> RepositoryResult<Vec<(G, Vec<R>)>>
    where
        G: Ord + Serialize + DeserializeOwned,
        R: Serialize + DeserializeOwned,
    {
        self.cache.execute_group_items(spec, group_by, selector, || {
            let mut groups: BTreeMap<G, Vec<R>> = BTreeMap::new();
            for item in self.matching(spec)? {
                groups
                    .entry(group_by.apply(&item))
                    .or_default()
                    .push(selector.apply(&item));
            }
            Ok(groups.into_iter().collect())
        })
    }
}

fn ordered<T: Record>(items: Vec<T>, options: Option<&QueryOptions>) -> Vec<T> {
    match options {
        Some(options) => options.apply(items),
        None => items,
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest generators for expressions and entities.

    use super::*;
    use proptest::prelude::*;

    /// Members of [`Widget`] usable in predicates.
    pub fn arb_member() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("id".to_string()),
            Just("kind".to_string()),
            Just("name".to_string()),
            Just("price".to_string()),
        ]
    }

    /// Scalar literal.
    pub fn arb_literal() -> impl Strategy<Value = Value> {
        prop_oneof![
            (-50i64..50).prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ]
    }

    /// `x.member <op> literal`, with the literal either constant or captured.
    pub fn arb_comparison() -> impl Strategy<Value = Expr> {
        (arb_member(), arb_literal(), 0..6usize, any::<bool>()).prop_map(
            |(member, literal, op, captured)| {
                let right = if captured {
                    Expr::captured("value", move || literal.clone())
                } else {
                    Expr::Constant(literal)
                };
                let left = Expr::member(member);
                match op {
                    0 => left.equal_to(right),
                    1 => left.not_equal_to(right),
                    2 => left.greater_than(right),
                    3 => left.less_than(right),
                    4 => left.greater_or_equal(right),
                    _ => left.less_or_equal(right),
                }
            },
        )
    }

    /// Predicate tree of comparisons joined by `&&`, `||` and `!`.
    pub fn arb_predicate() -> impl Strategy<Value = Expr> {
        arb_comparison().prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
                inner.prop_map(|a| !a),
            ]
        })
    }

    pub fn arb_widget() -> impl Strategy<Value = Widget> {
        (1u32..10_000, 0i32..4, "[a-z]{1,8}", 0u32..10_000).prop_map(|(id, kind, name, cents)| {
            Widget {
                id,
                kind,
                name,
                price: f64::from(cents) / 100.0,
            }
        })
    }

    /// Widgets with distinct ids.
    pub fn arb_widgets(max: usize) -> impl Strategy<Value = Vec<Widget>> {
        prop::collection::vec(arb_widget(), 0..max).prop_map(|widgets| {
            let mut seen = std::collections::HashSet::new();
            widgets.into_iter().filter(|w| seen.insert(w.id)).collect()
        })
    }

    pub fn arb_options() -> impl Strategy<Value = QueryOptions> {
        (arb_member(), any::<bool>(), prop::option::of((1usize..5, 1usize..10))).prop_map(
            |(member, descending, paging)| {
                let options = if descending {
                    QueryOptions::sorted_by_descending(member)
                } else {
                    QueryOptions::sorted_by(member)
                };
                match paging {
                    Some((page, size)) => options.paged(page, size),
                    None => options,
                }
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built repositories and entities for common caching scenarios.

    use super::*;
    use repocache_storage::{from_config_partitioned, KeyScope, TimeoutStrategy};

    pub type WidgetRepository = InMemoryRepository<Widget, u32>;
    pub type LineItemRepository = InMemoryRepository<LineItem, (Uuid, u32)>;

    pub fn widget(id: u32, kind: i32, name: &str, price: f64) -> Widget {
        Widget {
            id,
            kind,
            name: name.to_string(),
            price,
        }
    }

    /// Six widgets: ids 1-3 of kind 1, ids 4-5 of kind 2, id 6 of kind 3.
    pub fn sample_widgets() -> Vec<Widget> {
        vec![
            widget(1, 1, "anvil", 12.5),
            widget(2, 1, "bolt", 0.25),
            widget(3, 1, "crank", 7.0),
            widget(4, 2, "dowel", 1.5),
            widget(5, 2, "easel", 40.0),
            widget(6, 3, "funnel", 3.75),
        ]
    }

    pub fn kind_selector() -> PartitionSelector<Widget, i32> {
        PartitionSelector::new("kind", |w: &Widget| w.kind)
    }

    pub fn kind_is(kind: i32) -> Specification<Widget> {
        Specification::new(Expr::member("kind").equal_to(Expr::constant(kind)))
    }

    pub fn price_selector() -> Selector<Widget, f64> {
        Selector::member("price", |w: &Widget| w.price)
    }

    pub fn kind_group() -> Selector<Widget, i32> {
        Selector::member("kind", |w: &Widget| w.kind)
    }

    pub fn name_selector() -> Selector<Widget, String> {
        Selector::member("name", |w: &Widget| w.name.clone())
    }

    /// Widget repository for `strategy`, sharing `provider`.
    pub fn widget_repository_with(
        strategy: StrategyConfig,
        provider: Arc<dyn CacheProvider>,
    ) -> WidgetRepository {
        let config = CacheConfig::new().with_prefix("test").with_strategy(strategy);
        let strategy = from_config_partitioned::<Widget, u32, i32>(&config, provider, kind_selector())
            .unwrap_or_else(|e| panic!("fixture config must be valid: {}", e));
        WidgetRepository::new(QueryManager::new(Some(strategy)), |w: &Widget| w.id)
    }

    pub fn widget_repository(strategy: StrategyConfig) -> WidgetRepository {
        widget_repository_with(strategy, Arc::new(InMemoryCacheProvider::new()))
    }

    pub fn standard_repository() -> WidgetRepository {
        widget_repository(StrategyConfig::Standard)
    }

    pub fn partitioned_repository() -> WidgetRepository {
        widget_repository(StrategyConfig::StandardPartitioned)
    }

    /// Timeout repository; `ttl` may be shorter than the one-second
    /// granularity of [`StrategyConfig::Timeout`].
    pub fn timeout_repository(ttl: Duration) -> WidgetRepository {
        let strategy = TimeoutStrategy::new(
            Arc::new(InMemoryCacheProvider::new()),
            KeyScope::for_entity::<Widget>("test"),
            ttl,
        );
        WidgetRepository::new(QueryManager::with_strategy(strategy), |w: &Widget| w.id)
    }

    pub fn no_cache_repository() -> WidgetRepository {
        widget_repository(StrategyConfig::NoCache)
    }

    /// Repository pre-loaded with [`sample_widgets`], mutation bumps included.
    pub fn seeded(repository: WidgetRepository) -> WidgetRepository {
        for w in sample_widgets() {
            repository
                .add(w)
                .unwrap_or_else(|e| panic!("seeding must succeed: {}", e));
        }
        repository
    }

    pub fn line_item(order_id: Uuid, line: u32, sku: &str, quantity: u32) -> LineItem {
        LineItem {
            order_id,
            line,
            sku: sku.to_string(),
            quantity,
        }
    }

    /// Line-item repository keyed by `(order_id, line)` with the standard strategy.
    pub fn line_item_repository() -> LineItemRepository {
        let config = CacheConfig::new().with_prefix("test");
        let manager = QueryManager::from_config(&config, Arc::new(InMemoryCacheProvider::new()))
            .unwrap_or_else(|e| panic!("fixture config must be valid: {}", e));
        LineItemRepository::new(manager, |item: &LineItem| (item.order_id, item.line))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache behavior and repocache errors.

    use super::*;
    use repocache_core::{ExpressionError, KeyError};

    /// Assert that the last query was served from cache.
    #[track_caller]
    pub fn assert_cache_hit<T, K>(repository: &InMemoryRepository<T, K>)
    where
        T: CacheableEntity + Record,
        K: EntityKey,
    {
        assert!(
            repository.cache().cache_used(),
            "Expected the last query to be served from cache"
        );
    }

    /// Assert that the last query ran against the store.
    #[track_caller]
    pub fn assert_cache_miss<T, K>(repository: &InMemoryRepository<T, K>)
    where
        T: CacheableEntity + Record,
        K: EntityKey,
    {
        assert!(
            !repository.cache().cache_used(),
            "Expected the last query to run against the store"
        );
    }

    /// Assert that a result failed with an unsupported-expression error.
    #[track_caller]
    pub fn assert_unsupported_expression<T: std::fmt::Debug>(result: &RepositoryResult<T>) {
        match result {
            Err(RepositoryError::Cache(RepoCacheError::Expression(ExpressionError::Unsupported {
                ..
            }))) => {}
            other => panic!("Expected unsupported expression error, got: {:?}", other),
        }
    }

    /// Assert that a result failed with a key type mismatch at `position`.
    #[track_caller]
    pub fn assert_key_type_mismatch<T: std::fmt::Debug>(result: &RepoCacheResult<T>, position: usize) {
        match result {
            Err(RepoCacheError::Key(KeyError::TypeMismatch { position: p, .. })) => {
                assert_eq!(*p, position, "Wrong position in TypeMismatch error");
            }
            other => panic!("Expected key type mismatch at {}, got: {:?}", position, other),
        }
    }

    /// Assert that a result failed because the cache provider faulted.
    #[track_caller]
    pub fn assert_provider_fault<T: std::fmt::Debug>(result: &RepositoryResult<T>) {
        match result {
            Err(RepositoryError::Cache(err)) if err.is_provider_fault() => {}
            other => panic!("Expected provider fault, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
