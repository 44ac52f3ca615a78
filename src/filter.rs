//! Boolean filter trees for dataset queries.
//!
//! A [`Filter`] is built from field conditions and combined with `&` (and),
//! `|` (or) and `!` (not):
//!
//! ```
//! use quartzbio_client::Filter;
//!
//! let free = Filter::eq("price", "Free");
//! let mexican = Filter::eq("style", "Mexican");
//! let f = &free | &mexican;
//! assert_eq!(
//!     f.to_json(),
//!     serde_json::json!({"or": [["price", "Free"], ["style", "Mexican"]]})
//! );
//! ```
//!
//! Field names carry the operator as a suffix:
//!
//! * `<field>` matches the exact value (strings are never tokenized)
//! * `<field>__in` matches any of a list of values
//! * `<field>__range` matches `[start, end]` inclusive
//! * `<field>__between` matches `(start, end)` exclusive
//! * `<field>__gt`, `__gte`, `__lt`, `__lte` compare numerically

use crate::error::{QuartzBioError, QuartzBioResult};
use serde_json::{json, Value};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Comparison selected by a field-name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exact,
    In,
    Range,
    Between,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    const SUFFIXED: [Operator; 7] = [
        Operator::In,
        Operator::Range,
        Operator::Between,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Operator::Exact => "",
            Operator::In => "in",
            Operator::Range => "range",
            Operator::Between => "between",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
        }
    }

    /// Split `field__op` into the field name and its operator.
    /// Unknown suffixes are part of the field name.
    pub fn parse(field_op: &str) -> (&str, Operator) {
        if let Some((field, suffix)) = field_op.rsplit_once("__") {
            if let Some(op) = Self::SUFFIXED.iter().find(|op| op.suffix() == suffix) {
                return (field, *op);
            }
        }
        (field_op, Operator::Exact)
    }

    fn key(self, field: &str) -> String {
        match self {
            Operator::Exact => field.to_string(),
            op => format!("{}__{}", field, op.suffix()),
        }
    }

    fn validate(self, field_op: &str, value: &Value) -> QuartzBioResult<()> {
        let ok = match self {
            Operator::Exact => true,
            Operator::In => value.is_array(),
            Operator::Range | Operator::Between => {
                value.as_array().map_or(false, |bounds| bounds.len() == 2)
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                !value.is_array() && !value.is_object()
            }
        };

        if ok {
            Ok(())
        } else {
            let expected = match self {
                Operator::In => "a list of values",
                Operator::Range | Operator::Between => "a [start, end] pair",
                _ => "a single value",
            };
            Err(QuartzBioError::invalid_param(format!(
                "filter '{}' expects {}, got {}",
                field_op, expected, value
            )))
        }
    }
}

/// How two filters are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }
}

/// One node of a filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `field__op` compared against a value
    Condition { field: String, value: Value },
    And(Vec<Clause>),
    Or(Vec<Clause>),
    Not(Box<Clause>),
}

impl Clause {
    pub fn condition(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Condition {
            field: field.into(),
            value: value.into(),
        }
    }

    fn connect(conn: Connector, clauses: Vec<Clause>) -> Self {
        match conn {
            Connector::And => Clause::And(clauses),
            Connector::Or => Clause::Or(clauses),
        }
    }

    fn children_mut(&mut self, conn: Connector) -> Option<&mut Vec<Clause>> {
        match (self, conn) {
            (Clause::And(children), Connector::And) | (Clause::Or(children), Connector::Or) => {
                Some(children)
            }
            _ => None,
        }
    }

    /// Wire form: conditions are `[field, value]` pairs, combinators are
    /// single-key objects
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Condition { field, value } => json!([field, value]),
            Clause::And(children) => json!({ "and": Self::list(children) }),
            Clause::Or(children) => json!({ "or": Self::list(children) }),
            Clause::Not(inner) => json!({ "not": inner.to_json() }),
        }
    }

    fn list(children: &[Clause]) -> Vec<Value> {
        children.iter().map(Clause::to_json).collect()
    }
}

/// A boolean filter tree.
///
/// Combining and negating always produce new filters; operands are left
/// untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// The filter that matches everything
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single `field__op` condition, validated against its operator
    pub fn new(field_op: &str, value: impl Into<Value>) -> QuartzBioResult<Self> {
        Self::from_conditions([(field_op, value.into())])
    }

    /// Several `field__op` conditions ANDed together, in order
    pub fn from_conditions<I, K, V>(conditions: I) -> QuartzBioResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut clauses = Vec::new();
        for (field_op, value) in conditions {
            let field_op = field_op.as_ref();
            let value = value.into();
            let (field, op) = Operator::parse(field_op);
            if field.is_empty() {
                return Err(QuartzBioError::invalid_param(format!(
                    "filter '{}' has an empty field name",
                    field_op
                )));
            }
            op.validate(field_op, &value)?;
            clauses.push(Clause::condition(field_op, value));
        }
        Ok(Self::all(clauses))
    }

    /// AND a list of clauses at one level
    pub(crate) fn all(clauses: Vec<Clause>) -> Self {
        if clauses.len() > 1 {
            Self {
                clauses: vec![Clause::And(clauses)],
            }
        } else {
            Self { clauses }
        }
    }

    fn condition(field: &str, op: Operator, value: Value) -> Self {
        Self {
            clauses: vec![Clause::condition(op.key(field), value)],
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Exact, value.into())
    }

    pub fn is_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::condition(field, Operator::In, Value::Array(values))
    }

    /// Inclusive range
    pub fn range(field: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Range, json!([start.into(), end.into()]))
    }

    /// Exclusive range
    pub fn between(field: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Between, json!([start.into(), end.into()]))
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Gt, value.into())
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Gte, value.into())
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Lt, value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, Operator::Lte, value.into())
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Join two filters with `conn`.
    ///
    /// If either root is already a `conn` node the other side's clauses are
    /// appended to it, so chains of `&` or `|` stay flat.
    pub fn combine(&self, other: &Filter, conn: Connector) -> Filter {
        if self.clauses.is_empty() {
            return other.clone();
        }
        if other.clauses.is_empty() {
            return self.clone();
        }

        let mut lhs = self.clauses.clone();
        let mut rhs = other.clauses.clone();

        if let Some(children) = lhs[0].children_mut(conn) {
            children.extend(rhs);
            return Filter { clauses: lhs };
        }
        if let Some(children) = rhs[0].children_mut(conn) {
            children.extend(lhs);
            return Filter { clauses: rhs };
        }

        lhs.extend(rhs);
        Filter {
            clauses: vec![Clause::connect(conn, lhs)],
        }
    }

    /// Negate the filter. Negating a negation unwraps it.
    pub fn negate(&self) -> Filter {
        match self.clauses.as_slice() {
            [] => Filter::empty(),
            [Clause::Not(inner)] => Filter {
                clauses: vec![(**inner).clone()],
            },
            [single] => Filter {
                clauses: vec![Clause::Not(Box::new(single.clone()))],
            },
            many => Filter {
                clauses: vec![Clause::Not(Box::new(Clause::And(many.to_vec())))],
            },
        }
    }

    /// Top-level clauses in wire form
    pub fn to_wire(&self) -> Vec<Value> {
        Clause::list(&self.clauses)
    }

    /// Wire form of the whole tree: a single clause is sent as is, several
    /// are wrapped in one `and`
    pub fn to_json(&self) -> Value {
        match self.clauses.as_slice() {
            [] => Value::Null,
            [single] => single.to_json(),
            many => json!({ "and": Clause::list(many) }),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Filter {}>", Value::Array(self.to_wire()))
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.combine(&rhs, Connector::And)
    }
}

impl<'a> BitAnd<&'a Filter> for &'a Filter {
    type Output = Filter;

    fn bitand(self, rhs: &'a Filter) -> Filter {
        self.combine(rhs, Connector::And)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.combine(&rhs, Connector::Or)
    }
}

impl<'a> BitOr<&'a Filter> for &'a Filter {
    type Output = Filter;

    fn bitor(self, rhs: &'a Filter) -> Filter {
        self.combine(rhs, Connector::Or)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        self.negate()
    }
}

impl Not for &Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        self.negate()
    }
}
