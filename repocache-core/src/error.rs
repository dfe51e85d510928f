//! Error types for repocache operations

use thiserror::Error;

/// Expression-tree errors raised while rendering or evaluating predicates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Unsupported expression shape {node}: {reason}")]
    Unsupported { node: String, reason: String },
}

/// Faults raised by the underlying cache provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Cache provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache provider rejected key {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Key errors raised at the repository boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Key type mismatch at position {position}: expected {expected}, got {got}")]
    TypeMismatch {
        position: usize,
        expected: String,
        got: String,
    },

    #[error("Key arity mismatch: expected {expected} parts, got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all repocache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoCacheError {
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

impl RepoCacheError {
    /// Shorthand for an unsupported expression node.
    pub fn unsupported(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Expression(ExpressionError::Unsupported {
            node: node.into(),
            reason: reason.into(),
        })
    }

    /// True when the error came from the cache provider.
    pub fn is_provider_fault(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

impl From<serde_json::Error> for RepoCacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for repocache operations.
pub type RepoCacheResult<T> = Result<T, RepoCacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_error_display_unsupported() {
        let err = ExpressionError::Unsupported {
            node: "Custom(is_even)".to_string(),
            reason: "closure has no stable text".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unsupported expression shape"));
        assert!(msg.contains("is_even"));
    }

    #[test]
    fn test_provider_error_display_lock_poisoned() {
        let msg = format!("{}", ProviderError::LockPoisoned);
        assert!(msg.contains("lock poisoned"));
    }

    #[test]
    fn test_key_error_display_type_mismatch() {
        let err = KeyError::TypeMismatch {
            position: 1,
            expected: "integer".to_string(),
            got: "string".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("position 1"));
        assert!(msg.contains("integer"));
        assert!(msg.contains("string"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "prefix".to_string(),
            value: "a/b".to_string(),
            reason: "must not contain '/'".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("prefix"));
        assert!(msg.contains("a/b"));
    }

    #[test]
    fn test_repo_cache_error_from_variants() {
        let expr = RepoCacheError::unsupported("Custom", "opaque");
        assert!(matches!(expr, RepoCacheError::Expression(_)));

        let provider = RepoCacheError::from(ProviderError::LockPoisoned);
        assert!(provider.is_provider_fault());

        let key = RepoCacheError::from(KeyError::ArityMismatch {
            expected: 2,
            got: 3,
        });
        assert!(matches!(key, RepoCacheError::Key(_)));

        let config = RepoCacheError::from(ConfigError::MissingRequired {
            field: "partition".to_string(),
        });
        assert!(matches!(config, RepoCacheError::Config(_)));
        assert!(!config.is_provider_fault());
    }

    #[test]
    fn test_serde_error_becomes_serialization() {
        let err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let converted = RepoCacheError::from(err);
        assert!(matches!(converted, RepoCacheError::Serialization { .. }));
    }
}
