//! repocache Core - Query Types
//!
//! Pure data structures shared by the caching layer and the repositories
//! that call it: the error taxonomy, predicate and selector expression trees,
//! sorting/paging options, entity and key identity, and configuration.
//! This crate contains no cache logic.

pub mod config;
pub mod error;
pub mod expr;
pub mod identity;
pub mod options;
pub mod specification;

pub use config::{CacheConfig, StrategyConfig};
pub use error::{
    ConfigError, ExpressionError, KeyError, ProviderError, RepoCacheError, RepoCacheResult,
};
pub use expr::{order_values, CapturedFn, CompareOp, CustomPredicate, Expr, Method, Record};
pub use identity::{
    compute_content_hash, content_digest, CacheableEntity, CompoundKey, ContentHash, EntityKey,
    KeyKind,
};
pub use options::{Paging, QueryOptions, Sort};
pub use specification::{Selector, Specification};
