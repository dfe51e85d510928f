//! Partition resolution.
//!
//! The partitioned strategy needs to know, for a query predicate, whether
//! every matching entity is confined to one value of the partition member.
//! That holds when the predicate contains `x.member == v` as a conjunct.
//! Anything else (disjunctions over different values, negations, range
//! comparisons, closures) may match entities in several partitions and is
//! treated as cross-partition.
//!
//! | predicate                          | result          |
//! |------------------------------------|-----------------|
//! | `x.kind == 1`, `1 == x.kind`       | `Matched(1)`    |
//! | `x.kind.Equals(1)`                 | `Matched(1)`    |
//! | `a && b`, one side matched         | `Matched`       |
//! | `a && b`, sides disagree           | `Unsupported`   |
//! | `a \|\| b`, same value both sides   | `Matched`       |
//! | `a \|\| b`, otherwise               | `NotMatched`    |
//! | `!a`, `>`, `<`, `!=`, closures     | `NotMatched`    |

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use repocache_core::{order_values, CompareOp, Expr, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome of resolving a predicate against a partition member.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<P> {
    /// Every matching entity has this partition value.
    Matched(P),
    /// The predicate does not confine results to one partition.
    NotMatched,
    /// The predicate names the member in a way that cannot be confined
    /// (contradictory conjuncts, or a value of the wrong type).
    Unsupported(String),
}

impl<P> Resolution<P> {
    pub fn matched(self) -> Option<P> {
        match self {
            Resolution::Matched(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Resolution::Matched(_))
    }
}

/// Typed accessor for the partition member of an entity.
///
/// `member` is the dotted path predicates use (`"kind"`); `project` reads the
/// same member from a live entity. The two must agree.
pub struct PartitionSelector<T, P> {
    member: String,
    project: Arc<dyn Fn(&T) -> P + Send + Sync>,
}

impl<T, P> PartitionSelector<T, P> {
    pub fn new<F>(member: impl Into<String>, project: F) -> Self
    where
        F: Fn(&T) -> P + Send + Sync + 'static,
    {
        Self {
            member: member.into(),
            project: Arc::new(project),
        }
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// Partition value of an entity.
    pub fn resolve(&self, entity: &T) -> P {
        (self.project)(entity)
    }
}

impl<T, P> Clone for PartitionSelector<T, P> {
    fn clone(&self) -> Self {
        Self {
            member: self.member.clone(),
            project: Arc::clone(&self.project),
        }
    }
}

impl<T, P> fmt::Debug for PartitionSelector<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionSelector")
            .field("member", &self.member)
            .finish_non_exhaustive()
    }
}

/// Stateless predicate walker. Never fails; unknown shapes are `NotMatched`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionResolver;

impl PartitionResolver {
    /// Resolve `predicate` against `selector`, converting the matched value
    /// to the partition type.
    pub fn try_resolve<T, P>(predicate: &Expr, selector: &PartitionSelector<T, P>) -> Resolution<P>
    where
        P: DeserializeOwned,
    {
        match Self::try_resolve_value(predicate, selector.member()) {
            Resolution::Matched(value) => match serde_json::from_value::<P>(value.clone()) {
                Ok(p) => Resolution::Matched(p),
                Err(e) => Resolution::Unsupported(format!(
                    "partition value {} does not convert: {}",
                    value, e
                )),
            },
            Resolution::NotMatched => Resolution::NotMatched,
            Resolution::Unsupported(reason) => Resolution::Unsupported(reason),
        }
    }

    /// Resolve `predicate` against a member path, yielding the raw value.
    pub fn try_resolve_value(predicate: &Expr, member: &str) -> Resolution<Value> {
        match predicate {
            Expr::Compare {
                op: CompareOp::Eq,
                left,
                right,
            } => equality(left, right, member),
            Expr::Method {
                target,
                method: Method::Equals,
                args,
            } => match args.as_slice() {
                [arg] => equality(target, arg, member),
                _ => Resolution::NotMatched,
            },
            Expr::And(left, right) => {
                let left = Self::try_resolve_value(left, member);
                let right = Self::try_resolve_value(right, member);
                match (left, right) {
                    (Resolution::Unsupported(reason), _) | (_, Resolution::Unsupported(reason)) => {
                        Resolution::Unsupported(reason)
                    }
                    (Resolution::Matched(a), Resolution::Matched(b)) => {
                        if same_value(&a, &b) {
                            Resolution::Matched(a)
                        } else {
                            Resolution::Unsupported(format!(
                                "conjunction requires {} == {} and {} == {}",
                                member, a, member, b
                            ))
                        }
                    }
                    (Resolution::Matched(v), Resolution::NotMatched)
                    | (Resolution::NotMatched, Resolution::Matched(v)) => Resolution::Matched(v),
                    (Resolution::NotMatched, Resolution::NotMatched) => Resolution::NotMatched,
                }
            }
            Expr::Or(left, right) => {
                match (
                    Self::try_resolve_value(left, member),
                    Self::try_resolve_value(right, member),
                ) {
                    (Resolution::Matched(a), Resolution::Matched(b)) if same_value(&a, &b) => {
                        Resolution::Matched(a)
                    }
                    _ => Resolution::NotMatched,
                }
            }
            _ => Resolution::NotMatched,
        }
    }
}

fn equality(a: &Expr, b: &Expr, member: &str) -> Resolution<Value> {
    let pair = match (a.member_path(), b.member_path()) {
        (Some(path), None) => Some((path, b)),
        (None, Some(path)) => Some((path, a)),
        _ => None,
    };
    match pair {
        Some((path, other)) if path == member => match other.constant_value() {
            Some(value) => Resolution::Matched(value),
            None => Resolution::NotMatched,
        },
        _ => Resolution::NotMatched,
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    order_values(a, b) == Some(Ordering::Equal)
}
