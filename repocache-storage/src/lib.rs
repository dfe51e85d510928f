//! repocache Storage - Query Manager and Invalidation Strategies
//!
//! Caching layer that sits between a repository and its backing store.
//! Query types live in `repocache-core`; this crate decides where results
//! are cached and when they are retired.

pub mod cache;

pub use cache::{
    from_config, from_config_partitioned, CacheKey, CacheProvider, CacheStats, CachedQuery,
    CachedValue, CompoundQueryManager, Generation, GenerationScope, GenerationStore,
    InMemoryCacheProvider, InvalidationStrategy, InvalidationStrategyExt, KeyCodec, KeyScope,
    NoCacheStrategy, PartitionResolver, PartitionSelector, QueryManager, QueryManager2,
    QueryManager3, QueryShape, Resolution, ResultSlot, StandardPartitionedStrategy,
    StandardStrategy, TimeoutStrategy,
};
