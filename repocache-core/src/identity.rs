//! Entity and key identity types

use crate::error::{KeyError, RepoCacheResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// SHA-256 content hash.
pub type ContentHash = [u8; 32];

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hex-encoded SHA-256 of `content`. Fixed width (64 chars).
pub fn content_digest(content: &[u8]) -> String {
    hex::encode(compute_content_hash(content))
}

/// Marker trait for entities whose query results can be cached.
///
/// Cached payloads are serialized, so entities must round-trip through
/// serde. `type_name()` scopes every cache key and generation counter.
pub trait CacheableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name for this entity type.
    fn type_name() -> &'static str;
}

/// A repository key that can be rendered into a cache key.
///
/// `key_text` must be injective: two different keys never render to the
/// same text.
pub trait EntityKey: Clone + Send + Sync + 'static {
    fn key_text(&self) -> String;

    /// Validate the key against a declared shape. Statically typed keys are
    /// always valid; only [`CompoundKey`] checks anything.
    fn check_shape(&self, _shape: &[KeyKind]) -> RepoCacheResult<()> {
        Ok(())
    }
}

macro_rules! integer_key {
    ($($t:ty),*) => {
        $(
            impl EntityKey for $t {
                fn key_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

integer_key!(i16, i32, i64, u16, u32, u64, usize);

impl EntityKey for String {
    fn key_text(&self) -> String {
        // JSON quoting keeps separators inside the string from colliding
        // with tuple rendering.
        Value::String(self.clone()).to_string()
    }
}

impl EntityKey for Uuid {
    fn key_text(&self) -> String {
        self.hyphenated().to_string()
    }
}

impl<A: EntityKey, B: EntityKey> EntityKey for (A, B) {
    fn key_text(&self) -> String {
        format!("[{},{}]", self.0.key_text(), self.1.key_text())
    }
}

impl<A: EntityKey, B: EntityKey, C: EntityKey> EntityKey for (A, B, C) {
    fn key_text(&self) -> String {
        format!(
            "[{},{},{}]",
            self.0.key_text(),
            self.1.key_text(),
            self.2.key_text()
        )
    }
}

/// Runtime kind of one compound-key part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Integer,
    String,
    Bool,
    Uuid,
}

impl KeyKind {
    fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (KeyKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (KeyKind::String, Value::String(_)) => true,
            (KeyKind::Bool, Value::Bool(_)) => true,
            (KeyKind::Uuid, Value::String(s)) => Uuid::parse_str(s).is_ok(),
            _ => false,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyKind::Integer => "integer",
            KeyKind::String => "string",
            KeyKind::Bool => "bool",
            KeyKind::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Untyped compound key of any arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundKey(Vec<Value>);

impl CompoundKey {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }
}

impl EntityKey for CompoundKey {
    fn key_text(&self) -> String {
        Value::Array(self.0.clone()).to_string()
    }

    fn check_shape(&self, shape: &[KeyKind]) -> RepoCacheResult<()> {
        if self.0.len() != shape.len() {
            return Err(KeyError::ArityMismatch {
                expected: shape.len(),
                got: self.0.len(),
            }
            .into());
        }
        for (position, (kind, part)) in shape.iter().zip(&self.0).enumerate() {
            if !kind.admits(part) {
                return Err(KeyError::TypeMismatch {
                    position,
                    expected: kind.to_string(),
                    got: describe(part).to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl<const N: usize> From<[Value; N]> for CompoundKey {
    fn from(parts: [Value; N]) -> Self {
        Self(parts.into())
    }
}
