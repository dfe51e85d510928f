//! Description of a cacheable query.
//!
//! A [`CachedQuery`] names the result shape and borrows every input that
//! affects the result: keys, predicate, selector, grouping and options.
//! Strategies derive the cache key from it; the query manager builds one per
//! repository call.

use repocache_core::{Expr, QueryOptions};

/// Result shape of a repository query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryShape {
    Get,
    GetMany,
    GetAll,
    Find,
    FindAll,
    Count,
    LongCount,
    Sum,
    Average,
    Min,
    Max,
    Group,
}

impl QueryShape {
    /// Segment used inside cache keys.
    pub fn name(&self) -> &'static str {
        match self {
            QueryShape::Get => "get",
            QueryShape::GetMany => "get-many",
            QueryShape::GetAll => "get-all",
            QueryShape::Find => "find",
            QueryShape::FindAll => "find-all",
            QueryShape::Count => "count",
            QueryShape::LongCount => "long-count",
            QueryShape::Sum => "sum",
            QueryShape::Average => "average",
            QueryShape::Min => "min",
            QueryShape::Max => "max",
            QueryShape::Group => "group",
        }
    }
}

/// Borrowed description of one query.
#[derive(Debug)]
pub struct CachedQuery<'a, K> {
    shape: QueryShape,
    keys: &'a [K],
    predicate: Option<&'a Expr>,
    selector: Option<&'a Expr>,
    group_by: Option<&'a Expr>,
    options: Option<&'a QueryOptions>,
}

impl<K> Clone for CachedQuery<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for CachedQuery<'_, K> {}

impl<'a, K> CachedQuery<'a, K> {
    /// A query of the given shape with no inputs.
    pub fn new(shape: QueryShape) -> Self {
        Self {
            shape,
            keys: &[],
            predicate: None,
            selector: None,
            group_by: None,
            options: None,
        }
    }

    /// Get-by-key. Without a selector this is the write-through entity entry.
    pub fn get(key: &'a K) -> Self {
        Self {
            keys: std::slice::from_ref(key),
            ..Self::new(QueryShape::Get)
        }
    }

    /// Multi-get by keys. Key order is significant.
    pub fn get_many(keys: &'a [K]) -> Self {
        Self {
            keys,
            ..Self::new(QueryShape::GetMany)
        }
    }

    pub fn with_predicate(mut self, predicate: Option<&'a Expr>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_selector(mut self, selector: Option<&'a Expr>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_group_by(mut self, group_by: Option<&'a Expr>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_options(mut self, options: Option<&'a QueryOptions>) -> Self {
        self.options = options;
        self
    }

    pub fn shape(&self) -> QueryShape {
        self.shape
    }

    pub fn keys(&self) -> &'a [K] {
        self.keys
    }

    pub fn predicate(&self) -> Option<&'a Expr> {
        self.predicate
    }

    pub fn selector(&self) -> Option<&'a Expr> {
        self.selector
    }

    pub fn group_by(&self) -> Option<&'a Expr> {
        self.group_by
    }

    pub fn options(&self) -> Option<&'a QueryOptions> {
        self.options
    }

    /// True for a plain get-by-key, whose entry is updated in place on
    /// mutation instead of being retired by a generation bump.
    pub fn is_entity_get(&self) -> bool {
        self.shape == QueryShape::Get && self.selector.is_none()
    }
}
