//! Configuration types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which invalidation strategy a repository uses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Never cache.
    NoCache,
    /// Cache with an absolute expiration; no generational invalidation.
    Timeout { ttl_secs: u64 },
    /// One generation per repository.
    #[default]
    Standard,
    /// One generation per partition value.
    StandardPartitioned,
}

impl StrategyConfig {
    /// Timeout TTL as a `Duration`, if this is the timeout strategy.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            StrategyConfig::Timeout { ttl_secs } => Some(Duration::from_secs(*ttl_secs)),
            _ => None,
        }
    }
}

/// Caching configuration for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace for every key this repository writes.
    pub prefix: String,
    /// Initial value of the query manager's cache-enabled flag.
    pub enabled: bool,
    pub strategy: StrategyConfig,
    /// Captured collections longer than this are keyed by content hash.
    pub collection_hash_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "repocache".to_string(),
            enabled: true,
            strategy: StrategyConfig::default(),
            collection_hash_threshold: 16,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable or disable caching at startup.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the invalidation strategy.
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the collection hashing threshold.
    pub fn with_collection_hash_threshold(mut self, threshold: usize) -> Self {
        self.collection_hash_threshold = threshold;
        self
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "prefix".to_string(),
            });
        }
        if self.prefix.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "prefix".to_string(),
                value: self.prefix.clone(),
                reason: "must not contain '/'".to_string(),
            });
        }
        if let StrategyConfig::Timeout { ttl_secs: 0 } = self.strategy {
            return Err(ConfigError::InvalidValue {
                field: "strategy.ttl_secs".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
