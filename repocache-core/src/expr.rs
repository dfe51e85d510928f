//! Predicate and selector expression trees
//!
//! `Expr` is a closed set of node kinds that both the key codec and the
//! partition resolver walk. Values are carried as `serde_json::Value` so a
//! tree can be rendered, compared and evaluated without knowing the entity
//! type it is applied to.

use crate::error::{ExpressionError, RepoCacheError, RepoCacheResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Comparison operator for binary comparison nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Ge,
    /// Less than or equal
    Le,
}

impl CompareOp {
    /// Operator symbol used in rendered expressions.
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// Methods that may be called on a member or captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl Method {
    /// Method name used in rendered expressions.
    pub fn name(&self) -> &'static str {
        match self {
            Method::Equals => "Equals",
            Method::Contains => "Contains",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
        }
    }
}

/// Field access for anything a predicate can be evaluated against.
///
/// Paths are dotted member names (`"address.zip"`). Missing fields evaluate
/// to `Value::Null`.
pub trait Record {
    fn field(&self, path: &str) -> Option<Value>;
}

/// Closure producing the current value of a captured variable.
pub type CapturedFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Opaque predicate closure with no stable textual form.
pub type CustomPredicate = Arc<dyn Fn(&dyn Record) -> bool + Send + Sync>;

/// Expression tree over an entity parameter `x`.
#[derive(Clone)]
pub enum Expr {
    /// The lambda parameter itself (`x => x`).
    Parameter,
    /// Member access on the parameter (`x.kind`).
    Member(String),
    /// Literal value.
    Constant(Value),
    /// Variable captured from the enclosing scope, read at evaluation time.
    Captured { name: String, value: CapturedFn },
    /// Binary comparison.
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Method call on a target (`x.name.StartsWith("a")`, `ids.Contains(x.id)`).
    Method {
        target: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    /// Anonymous projection (`x => new { a = x.a, b = x.b }`).
    Projection(Vec<(String, Expr)>),
    /// User closure. Evaluable, but cannot be rendered into a cache key.
    Custom {
        name: String,
        predicate: CustomPredicate,
    },
}

impl Expr {
    /// Member access node.
    pub fn member(path: impl Into<String>) -> Self {
        Expr::Member(path.into())
    }

    /// Literal node.
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    /// Captured-variable node. `value` is re-read every time the tree is
    /// rendered or evaluated.
    pub fn captured<F>(name: impl Into<String>, value: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Expr::Captured {
            name: name.into(),
            value: Arc::new(value),
        }
    }

    /// Opaque closure node.
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        Expr::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Anonymous projection node; field order is significant.
    pub fn projection<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        Expr::Projection(fields.into_iter().map(|(n, e)| (n.into(), e)).collect())
    }

    /// Binary comparison with `self` on the left.
    pub fn compare(self, op: CompareOp, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn equal_to(self, right: Expr) -> Self {
        self.compare(CompareOp::Eq, right)
    }

    pub fn not_equal_to(self, right: Expr) -> Self {
        self.compare(CompareOp::Ne, right)
    }

    pub fn greater_than(self, right: Expr) -> Self {
        self.compare(CompareOp::Gt, right)
    }

    pub fn less_than(self, right: Expr) -> Self {
        self.compare(CompareOp::Lt, right)
    }

    pub fn greater_or_equal(self, right: Expr) -> Self {
        self.compare(CompareOp::Ge, right)
    }

    pub fn less_or_equal(self, right: Expr) -> Self {
        self.compare(CompareOp::Le, right)
    }

    /// Short-circuit conjunction.
    pub fn and(self, right: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(right))
    }

    /// Short-circuit disjunction.
    pub fn or(self, right: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(right))
    }

    /// Method call with `self` as the target.
    pub fn call(self, method: Method, args: Vec<Expr>) -> Self {
        Expr::Method {
            target: Box::new(self),
            method,
            args,
        }
    }

    /// `self.Equals(arg)`
    pub fn equals(self, arg: Expr) -> Self {
        self.call(Method::Equals, vec![arg])
    }

    /// `self.Contains(arg)`; works on arrays and strings.
    pub fn contains(self, arg: Expr) -> Self {
        self.call(Method::Contains, vec![arg])
    }

    pub fn starts_with(self, arg: Expr) -> Self {
        self.call(Method::StartsWith, vec![arg])
    }

    pub fn ends_with(self, arg: Expr) -> Self {
        self.call(Method::EndsWith, vec![arg])
    }

    /// Dotted path if this node is a member access.
    pub fn member_path(&self) -> Option<&str> {
        match self {
            Expr::Member(path) => Some(path),
            _ => None,
        }
    }

    /// Value of a constant or captured node, read now.
    pub fn constant_value(&self) -> Option<Value> {
        match self {
            Expr::Constant(value) => Some(value.clone()),
            Expr::Captured { value, .. } => Some(value()),
            _ => None,
        }
    }

    /// Short node label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Parameter => "Parameter",
            Expr::Member(_) => "Member",
            Expr::Constant(_) => "Constant",
            Expr::Captured { .. } => "Captured",
            Expr::Compare { .. } => "Compare",
            Expr::And(..) => "And",
            Expr::Or(..) => "Or",
            Expr::Not(_) => "Not",
            Expr::Method { .. } => "Method",
            Expr::Projection(_) => "Projection",
            Expr::Custom { .. } => "Custom",
        }
    }

    /// Evaluate the tree against a record.
    pub fn evaluate(&self, record: &dyn Record) -> RepoCacheResult<Value> {
        match self {
            Expr::Parameter => Err(RepoCacheError::unsupported(
                "Parameter",
                "the bare parameter has no value outside a projection",
            )),
            Expr::Member(path) => Ok(record.field(path).unwrap_or(Value::Null)),
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Captured { value, .. } => Ok(value()),
            Expr::Compare { op, left, right } => {
                let l = left.evaluate(record)?;
                let r = right.evaluate(record)?;
                Ok(Value::Bool(compare_values(*op, &l, &r)))
            }
            Expr::And(left, right) => {
                if !left.matches(record)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(right.matches(record)?))
            }
            Expr::Or(left, right) => {
                if left.matches(record)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(right.matches(record)?))
            }
            Expr::Not(inner) => Ok(Value::Bool(!inner.matches(record)?)),
            Expr::Method {
                target,
                method,
                args,
            } => {
                let [arg] = args.as_slice() else {
                    return Err(RepoCacheError::unsupported(
                        method.name(),
                        format!("expected 1 argument, got {}", args.len()),
                    ));
                };
                let target = target.evaluate(record)?;
                let arg = arg.evaluate(record)?;
                Ok(Value::Bool(apply_method(*method, &target, &arg)))
            }
            Expr::Projection(fields) => {
                let mut object = Map::new();
                for (name, expr) in fields {
                    object.insert(name.clone(), expr.evaluate(record)?);
                }
                Ok(Value::Object(object))
            }
            Expr::Custom { predicate, .. } => Ok(Value::Bool(predicate(record))),
        }
    }

    /// Evaluate the tree as a boolean predicate.
    pub fn matches(&self, record: &dyn Record) -> RepoCacheResult<bool> {
        match self.evaluate(record)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExpressionError::Unsupported {
                node: self.kind().to_string(),
                reason: format!("predicate evaluated to non-boolean {}", other),
            }
            .into()),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter => write!(f, "x"),
            Expr::Member(path) => write!(f, "x.{}", path),
            Expr::Constant(value) => write!(f, "{}", value),
            Expr::Captured { name, .. } => write!(f, "<captured {}>", name),
            Expr::Compare { op, left, right } => {
                write!(f, "({:?} {} {:?})", left, op.symbol(), right)
            }
            Expr::And(l, r) => write!(f, "({:?} && {:?})", l, r),
            Expr::Or(l, r) => write!(f, "({:?} || {:?})", l, r),
            Expr::Not(inner) => write!(f, "!{:?}", inner),
            Expr::Method {
                target,
                method,
                args,
            } => write!(f, "{:?}.{}({:?})", target, method.name(), args),
            Expr::Projection(fields) => f.debug_map().entries(fields.iter().map(|(k, v)| (k, v))).finish(),
            Expr::Custom { name, .. } => write!(f, "<custom {}>", name),
        }
    }
}

/// Order two JSON values of the same kind. Numbers compare numerically so
/// `1` and `1.0` are equal.
pub fn order_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            (left == right).then_some(Ordering::Equal)
        }
        _ => None,
    }
}

fn compare_values(op: CompareOp, left: &Value, right: &Value) -> bool {
    match order_values(left, right) {
        Some(ordering) => op.holds(ordering),
        // Values of different kinds are never equal and never ordered.
        None => op == CompareOp::Ne,
    }
}

fn apply_method(method: Method, target: &Value, arg: &Value) -> bool {
    match (method, target, arg) {
        (Method::Equals, _, _) => order_values(target, arg) == Some(Ordering::Equal),
        (Method::Contains, Value::Array(items), _) => items
            .iter()
            .any(|item| order_values(item, arg) == Some(Ordering::Equal)),
        (Method::Contains, Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
        (Method::StartsWith, Value::String(s), Value::String(prefix)) => {
            s.starts_with(prefix.as_str())
        }
        (Method::EndsWith, Value::String(s), Value::String(suffix)) => {
            s.ends_with(suffix.as_str())
        }
        _ => false,
    }
}
