//! Typed wrappers around expression trees
//!
//! A [`Specification`] is a boolean predicate over `T`; a [`Selector`] is a
//! projection `T -> R` that carries both the closure that computes `R` and
//! the expression shape the key codec renders.

use crate::error::RepoCacheResult;
use crate::expr::{Expr, Record};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Composable boolean predicate over entities of type `T`.
pub struct Specification<T> {
    predicate: Expr,
    _entity: PhantomData<fn(&T) -> bool>,
}

impl<T> Specification<T> {
    /// Wrap a predicate expression.
    pub fn new(predicate: Expr) -> Self {
        Self {
            predicate,
            _entity: PhantomData,
        }
    }

    /// The underlying predicate tree.
    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }

    /// `self AndAlso other`. Operand order is preserved.
    pub fn and(self, other: Specification<T>) -> Self {
        Self::new(self.predicate.and(other.predicate))
    }

    /// `self OrElse other`. Operand order is preserved.
    pub fn or(self, other: Specification<T>) -> Self {
        Self::new(self.predicate.or(other.predicate))
    }

    /// Consume the specification and return its predicate.
    pub fn into_predicate(self) -> Expr {
        self.predicate
    }
}

impl<T: Record> Specification<T> {
    /// Evaluate the predicate against an entity.
    pub fn is_satisfied_by(&self, entity: &T) -> RepoCacheResult<bool> {
        self.predicate.matches(entity)
    }
}

impl<T> std::ops::Not for Specification<T> {
    type Output = Specification<T>;

    fn not(self) -> Specification<T> {
        Specification::new(!self.predicate)
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self::new(self.predicate.clone())
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Specification").field(&self.predicate).finish()
    }
}

impl<T> From<Expr> for Specification<T> {
    fn from(predicate: Expr) -> Self {
        Self::new(predicate)
    }
}

/// Projection from `T` to `R` with a renderable shape.
pub struct Selector<T, R> {
    shape: Expr,
    project: Arc<dyn Fn(&T) -> R + Send + Sync>,
}

impl<T, R> Selector<T, R> {
    /// Build a selector from its expression shape and projection closure.
    ///
    /// The shape must describe what `project` computes; two selectors with
    /// the same shape share cache entries.
    pub fn new<F>(shape: Expr, project: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self {
            shape,
            project: Arc::new(project),
        }
    }

    /// Selector for a single member.
    pub fn member<F>(path: impl Into<String>, project: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self::new(Expr::member(path), project)
    }

    pub fn shape(&self) -> &Expr {
        &self.shape
    }

    pub fn apply(&self, entity: &T) -> R {
        (self.project)(entity)
    }
}

impl<T: Clone + 'static> Selector<T, T> {
    /// The `x => x` selector.
    pub fn identity() -> Self {
        Self::new(Expr::Parameter, T::clone)
    }
}

impl<T, R> Clone for Selector<T, R> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            project: Arc::clone(&self.project),
        }
    }
}

impl<T, R> fmt::Debug for Selector<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.shape).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[derive(Clone)]
    struct Item {
        kind: i64,
        name: String,
    }

    impl Record for Item {
        fn field(&self, path: &str) -> Option<Value> {
            match path {
                "kind" => Some(json!(self.kind)),
                "name" => Some(json!(self.name)),
                _ => None,
            }
        }
    }

    fn item(kind: i64, name: &str) -> Item {
        Item {
            kind,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_specification_composition() {
        let kind_one = Specification::<Item>::new(Expr::member("kind").equal_to(Expr::constant(1)));
        let named_a = Specification::<Item>::new(Expr::member("name").starts_with(Expr::constant("a")));

        let both = kind_one.clone().and(named_a.clone());
        assert!(both.is_satisfied_by(&item(1, "abc")).unwrap());
        assert!(!both.is_satisfied_by(&item(2, "abc")).unwrap());

        let either = kind_one.clone().or(named_a);
        assert!(either.is_satisfied_by(&item(2, "abc")).unwrap());

        let negated = !kind_one;
        assert!(negated.is_satisfied_by(&item(2, "zzz")).unwrap());
    }

    #[test]
    fn test_and_preserves_operand_order() {
        let a = Specification::<Item>::new(Expr::member("kind").equal_to(Expr::constant(1)));
        let b = Specification::<Item>::new(Expr::member("name").equal_to(Expr::constant("x")));
        match a.and(b).into_predicate() {
            Expr::And(left, _) => assert_eq!(left.kind(), "Compare"),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_selector_apply() {
        let name = Selector::<Item, String>::member("name", |i| i.name.clone());
        assert_eq!(name.apply(&item(1, "abc")), "abc");
        assert_eq!(name.shape().member_path(), Some("name"));

        let identity = Selector::<Item, Item>::identity();
        assert_eq!(identity.apply(&item(3, "q")).kind, 3);
        assert!(matches!(identity.shape(), Expr::Parameter));
    }
}
