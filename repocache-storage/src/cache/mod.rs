//! Generational query-result caching.
//!
//! A repository hands every read to a [`QueryManager`], which asks its
//! [`InvalidationStrategy`] for a cached result before running the query.
//! Writes are reported back so the strategy can retire what they made
//! stale.
//!
//! # Invalidation
//!
//! Nothing is ever deleted to invalidate. Cache keys embed generation
//! counters held in the [`CacheProvider`]; a mutation bumps a counter and
//! every key stamped with the old value becomes unreachable. Unreachable
//! entries are reclaimed by the provider's own eviction.
//!
//! # Keys
//!
//! Keys are derived from the query itself by the [`KeyCodec`]: two
//! structurally equal predicates with equal literal and captured values map
//! to the same key, regardless of variable names. Predicates containing
//! opaque closures cannot be keyed and fail with an expression error.
//!
//! # Example
//!
//! ```ignore
//! let provider: Arc<dyn CacheProvider> = Arc::new(InMemoryCacheProvider::new());
//! let manager = QueryManager::<Widget, u32>::from_config(&CacheConfig::new(), provider)?;
//!
//! let count = manager.execute_count(Some(&spec), || store.count(&spec))?;
//! manager.on_item_added(&widget.id, &widget)?;
//! ```

pub mod cache_key;
pub mod generation;
pub mod memory_backend;
pub mod partition;
pub mod query;
pub mod query_manager;
pub mod strategy;
pub mod traits;

pub use cache_key::{CacheKey, KeyCodec, DEFAULT_COLLECTION_HASH_THRESHOLD};
pub use generation::{Generation, GenerationScope, GenerationStore};
pub use memory_backend::InMemoryCacheProvider;
pub use partition::{PartitionResolver, PartitionSelector, Resolution};
pub use query::{CachedQuery, QueryShape};
pub use query_manager::{CompoundQueryManager, QueryManager, QueryManager2, QueryManager3};
pub use strategy::{
    from_config, from_config_partitioned, InvalidationStrategy, InvalidationStrategyExt, KeyScope,
    NoCacheStrategy, ResultSlot, StandardPartitionedStrategy, StandardStrategy, TimeoutStrategy,
};
pub use traits::{CacheProvider, CacheStats, CachedValue};
