//! Cache keys and the codec that renders queries into them.
//!
//! Expression trees are rendered positionally: the same node shape with the
//! same literal and captured values always renders to the same text, and
//! `A && B` renders differently from `B && A`. Captured variables are read
//! at render time, so the key reflects their value, never their name.
//!
//! Node kinds the codec cannot render (user closures) fail with
//! `ExpressionError::Unsupported` instead of producing a key that could
//! collide with a different query.

use std::fmt::{self, Write as _};

use repocache_core::{content_digest, EntityKey, Expr, QueryOptions, RepoCacheError, RepoCacheResult};
use serde_json::Value;
use tracing::trace;

use super::query::CachedQuery;

/// Separator between key segments.
const SEPARATOR: char = '/';

/// Default length above which captured collections are hashed.
pub const DEFAULT_COLLECTION_HASH_THRESHOLD: usize = 16;

/// Composite cache key.
///
/// Layout: `{prefix}/{type}/{shape}/{stamp}/{partition}/{fingerprint}`
///
/// - `stamp` carries the generation counters the entry was written under
/// - `partition` is `-` (unscoped), `*` (cross-partition) or `p:{value}`
/// - `fingerprint` is the SHA-256 of the rendered query text
///
/// Keys can only be built through [`CacheKey::new`], and are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKeyInner {
    rendered: String,
    prefix_len: usize,
    fingerprint: String,
}

impl CacheKey {
    /// Assemble a key from its segments.
    pub fn new(
        prefix: &str,
        type_name: &str,
        shape: &str,
        stamp: &str,
        partition: &str,
        fingerprint: String,
    ) -> Self {
        let scope = format!("{prefix}{SEPARATOR}{type_name}");
        let rendered = format!(
            "{scope}{SEPARATOR}{shape}{SEPARATOR}{stamp}{SEPARATOR}{partition}{SEPARATOR}{fingerprint}"
        );
        Self {
            inner: CacheKeyInner {
                prefix_len: scope.len(),
                rendered,
                fingerprint,
            },
        }
    }

    /// The full key as stored in the provider.
    pub fn as_str(&self) -> &str {
        &self.inner.rendered
    }

    /// `{prefix}/{type}` scope shared by every key of one repository.
    pub fn scope(&self) -> &str {
        &self.inner.rendered[..self.inner.prefix_len]
    }

    pub fn fingerprint(&self) -> &str {
        &self.inner.fingerprint
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.rendered)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Renders expressions, selectors and query options into stable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCodec {
    collection_hash_threshold: usize,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self {
            collection_hash_threshold: DEFAULT_COLLECTION_HASH_THRESHOLD,
        }
    }
}

impl KeyCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash captured collections longer than `threshold` elements.
    pub fn with_collection_hash_threshold(mut self, threshold: usize) -> Self {
        self.collection_hash_threshold = threshold;
        self
    }

    pub fn collection_hash_threshold(&self) -> usize {
        self.collection_hash_threshold
    }

    /// Render a predicate or selector as `x => ...`.
    pub fn encode(&self, expr: &Expr) -> RepoCacheResult<String> {
        let mut out = String::from("x => ");
        self.render(expr, &mut out)?;
        Ok(out)
    }

    /// Render sorting and paging options.
    pub fn encode_options(&self, options: &QueryOptions) -> String {
        options.signature()
    }

    /// Full rendered text of a query: every input that changes its result.
    pub fn query_text<K: EntityKey>(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<String> {
        let mut text = format!("shape={}", query.shape().name());
        if !query.keys().is_empty() {
            let keys = query
                .keys()
                .iter()
                .map(EntityKey::key_text)
                .collect::<Vec<_>>()
                .join(",");
            let _ = write!(text, ";keys=[{}]", keys);
        }
        if let Some(predicate) = query.predicate() {
            let _ = write!(text, ";where={}", self.encode(predicate)?);
        }
        if let Some(selector) = query.selector() {
            let _ = write!(text, ";select={}", self.encode(selector)?);
        }
        if let Some(group_by) = query.group_by() {
            let _ = write!(text, ";group={}", self.encode(group_by)?);
        }
        if let Some(options) = query.options() {
            let _ = write!(text, ";options={}", self.encode_options(options));
        }
        Ok(text)
    }

    /// Fixed-width fingerprint of a query.
    pub fn fingerprint<K: EntityKey>(&self, query: &CachedQuery<'_, K>) -> RepoCacheResult<String> {
        let text = self.query_text(query)?;
        trace!(text = %text, "rendered cache key");
        Ok(content_digest(text.as_bytes()))
    }

    fn render(&self, expr: &Expr, out: &mut String) -> RepoCacheResult<()> {
        match expr {
            Expr::Parameter => out.push('x'),
            Expr::Member(path) => {
                if !path.split('.').all(is_identifier) {
                    return Err(RepoCacheError::unsupported(
                        format!("Member({})", path),
                        "member paths must be dot-separated identifiers",
                    ));
                }
                out.push_str("x.");
                out.push_str(path);
            }
            Expr::Constant(value) => self.render_value(value, out),
            Expr::Captured { value, .. } => self.render_value(&value(), out),
            Expr::Compare { op, left, right } => {
                out.push('(');
                self.render(left, out)?;
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                self.render(right, out)?;
                out.push(')');
            }
            Expr::And(left, right) => self.render_logical("AndAlso", left, right, out)?,
            Expr::Or(left, right) => self.render_logical("OrElse", left, right, out)?,
            Expr::Not(inner) => {
                out.push_str("Not(");
                self.render(inner, out)?;
                out.push(')');
            }
            Expr::Method {
                target,
                method,
                args,
            } => {
                self.render(target, out)?;
                out.push('.');
                out.push_str(method.name());
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render(arg, out)?;
                }
                out.push(')');
            }
            Expr::Projection(fields) => {
                out.push_str("new {");
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if !is_identifier(name) {
                        return Err(RepoCacheError::unsupported(
                            format!("Projection({})", name),
                            "projected field names must be identifiers",
                        ));
                    }
                    out.push(' ');
                    out.push_str(name);
                    out.push_str(" = ");
                    self.render(value, out)?;
                }
                out.push_str(" }");
            }
            Expr::Custom { name, .. } => {
                return Err(RepoCacheError::unsupported(
                    format!("Custom({})", name),
                    "closure predicates have no stable textual form",
                ));
            }
        }
        Ok(())
    }

    fn render_logical(
        &self,
        op: &str,
        left: &Expr,
        right: &Expr,
        out: &mut String,
    ) -> RepoCacheResult<()> {
        out.push('(');
        self.render(left, out)?;
        out.push(' ');
        out.push_str(op);
        out.push(' ');
        self.render(right, out)?;
        out.push(')');
        Ok(())
    }

    fn render_value(&self, value: &Value, out: &mut String) {
        match value {
            Value::Array(items) if items.len() > self.collection_hash_threshold => {
                let mut raw = String::new();
                self.render_array(items, &mut raw);
                let _ = write!(out, "#{}[{}]", content_digest(raw.as_bytes()), items.len());
            }
            Value::Array(items) => self.render_array(items, out),
            Value::Object(map) => {
                // Sort explicitly: map iteration order depends on serde_json features.
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                out.push('{');
                for (i, (name, item)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String(name.clone()).to_string());
                    out.push(':');
                    self.render_value(item, out);
                }
                out.push('}');
            }
            scalar => out.push_str(&scalar.to_string()),
        }
    }

    fn render_array(&self, items: &[Value], out: &mut String) {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.render_value(item, out);
        }
        out.push(']');
    }
}

/// `[A-Za-z0-9_]+`; anything else could read as key syntax.
fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
