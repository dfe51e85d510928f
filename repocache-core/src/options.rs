//! Sorting and paging descriptors

use crate::expr::{order_values, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One sort term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    pub descending: bool,
}

/// Page window, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paging {
    pub page: usize,
    pub page_size: usize,
}

/// Sorting and paging applied to a multi-row query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryOptions {
    pub sorts: Vec<Sort>,
    pub paging: Option<Paging>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options sorted ascending by one property.
    pub fn sorted_by(property: impl Into<String>) -> Self {
        Self::new().then_by(property)
    }

    /// Options sorted descending by one property.
    pub fn sorted_by_descending(property: impl Into<String>) -> Self {
        Self::new().then_by_descending(property)
    }

    /// Add an ascending tie-breaker.
    pub fn then_by(mut self, property: impl Into<String>) -> Self {
        self.sorts.push(Sort {
            property: property.into(),
            descending: false,
        });
        self
    }

    /// Add a descending tie-breaker.
    pub fn then_by_descending(mut self, property: impl Into<String>) -> Self {
        self.sorts.push(Sort {
            property: property.into(),
            descending: true,
        });
        self
    }

    /// Restrict results to one page. Page numbers start at 1.
    pub fn paged(mut self, page: usize, page_size: usize) -> Self {
        self.paging = Some(Paging { page, page_size });
        self
    }

    /// Stable textual signature; part of every cache key that depends on
    /// these options. Property names are JSON-quoted, so distinct options
    /// never share a signature.
    pub fn signature(&self) -> String {
        let sorts = self
            .sorts
            .iter()
            .map(|s| {
                let property = Value::String(s.property.clone());
                format!("{} {}", property, if s.descending { "desc" } else { "asc" })
            })
            .collect::<Vec<_>>()
            .join(",");
        match self.paging {
            Some(p) => format!("sort[{}];page[{}x{}]", sorts, p.page, p.page_size),
            None => format!("sort[{}];page[all]", sorts),
        }
    }

    /// Sort and page a result set in memory.
    pub fn apply<T: Record>(&self, mut items: Vec<T>) -> Vec<T> {
        if !self.sorts.is_empty() {
            items.sort_by(|a, b| self.compare(a, b));
        }
        match self.paging {
            Some(Paging { page, page_size }) => {
                let skip = page.saturating_sub(1).saturating_mul(page_size);
                items.into_iter().skip(skip).take(page_size).collect()
            }
            None => items,
        }
    }

    fn compare<T: Record>(&self, a: &T, b: &T) -> Ordering {
        for sort in &self.sorts {
            let left = a.field(&sort.property).unwrap_or(Value::Null);
            let right = b.field(&sort.property).unwrap_or(Value::Null);
            let ordering = order_values(&left, &right).unwrap_or(Ordering::Equal);
            let ordering = if sort.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Row(i64, &'static str);

    impl Record for Row {
        fn field(&self, path: &str) -> Option<Value> {
            match path {
                "n" => Some(json!(self.0)),
                "s" => Some(json!(self.1)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_signature_is_order_sensitive() {
        let a = QueryOptions::sorted_by("name").then_by_descending("price");
        let b = QueryOptions::sorted_by_descending("price").then_by("name");
        assert_ne!(a.signature(), b.signature());
        assert_eq!(a.signature(), r#"sort["name" asc,"price" desc];page[all]"#);
    }

    #[test]
    fn test_signature_quotes_property_names() {
        let two_terms = QueryOptions::sorted_by_descending("name").then_by("price");
        let one_term = QueryOptions::sorted_by("name desc,price");
        assert_ne!(two_terms.signature(), one_term.signature());

        let quoted = QueryOptions::sorted_by("a\" asc,\"b");
        assert_ne!(quoted.signature(), QueryOptions::sorted_by("a").then_by("b").signature());
    }

    #[test]
    fn test_signature_includes_paging() {
        let a = QueryOptions::sorted_by("name").paged(1, 10);
        let b = QueryOptions::sorted_by("name").paged(2, 10);
        assert_ne!(a.signature(), b.signature());
        assert_ne!(a.signature(), QueryOptions::sorted_by("name").signature());
    }

    #[test]
    fn test_apply_sorts_then_pages() {
        let rows = vec![Row(3, "c"), Row(1, "a"), Row(2, "b"), Row(4, "d")];
        let page = QueryOptions::sorted_by_descending("n").paged(2, 2).apply(rows);
        let ns: Vec<i64> = page.iter().map(|r| r.0).collect();
        assert_eq!(ns, vec![2, 1]);
    }

    #[test]
    fn test_apply_tie_breaker() {
        let rows = vec![Row(1, "b"), Row(1, "a"), Row(0, "z")];
        let sorted = QueryOptions::sorted_by("n").then_by("s").apply(rows);
        let ss: Vec<&str> = sorted.iter().map(|r| r.1).collect();
        assert_eq!(ss, vec!["z", "a", "b"]);
    }

    #[test]
    fn test_options_deserialize() {
        let opts: QueryOptions = serde_json::from_value(json!({
            "sorts": [{"property": "name", "descending": false}],
            "paging": {"page": 1, "page_size": 25}
        }))
        .unwrap();
        assert_eq!(opts, QueryOptions::sorted_by("name").paged(1, 25));
    }
}
