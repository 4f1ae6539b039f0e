//! Predicate model: single filter conditions, groups of them, and ordering.
//!
//! Predicates are backend-agnostic. The criteria builder translates them
//! into [`Cond`](crate::Cond) trees before execution.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators a predicate can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
    Like(MatchMode),
    NotLike(MatchMode),
    /// Inclusive range `value <= x <= value2`
    Between,
    IsNull,
    IsNotNull,
    In,
    NotIn,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => write!(f, "eq"),
            Operator::Ne => write!(f, "ne"),
            Operator::Le => write!(f, "le"),
            Operator::Lt => write!(f, "lt"),
            Operator::Ge => write!(f, "ge"),
            Operator::Gt => write!(f, "gt"),
            Operator::Like(m) => write!(f, "like({})", m.lookup()),
            Operator::NotLike(m) => write!(f, "not_like({})", m.lookup()),
            Operator::Between => write!(f, "between"),
            Operator::IsNull => write!(f, "is_null"),
            Operator::IsNotNull => write!(f, "is_not_null"),
            Operator::In => write!(f, "in"),
            Operator::NotIn => write!(f, "not_in"),
        }
    }
}

/// How a `Like` predicate matches text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchMode {
    #[default]
    Exact,
    IExact,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Contains,
    IContains,
}

impl MatchMode {
    /// The lookup suffix this mode rewrites a path with.
    pub const fn lookup(self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::IExact => "iexact",
            MatchMode::StartsWith => "startswith",
            MatchMode::IStartsWith => "istartswith",
            MatchMode::EndsWith => "endswith",
            MatchMode::IEndsWith => "iendswith",
            MatchMode::Contains => "contains",
            MatchMode::IContains => "icontains",
        }
    }

    pub const fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            MatchMode::IExact | MatchMode::IStartsWith | MatchMode::IEndsWith | MatchMode::IContains
        )
    }
}

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub path: String,
    pub operator: Operator,
    pub value: Value,
    /// Upper bound for `Between`.
    pub value2: Value,
    /// Operands for `In`/`NotIn`.
    pub in_values: Vec<Value>,
}

impl Predicate {
    pub fn new(path: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            operator,
            value: value.into(),
            value2: Value::Null,
            in_values: Vec::new(),
        }
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Eq, value)
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Ne, value)
    }

    pub fn le(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Le, value)
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Lt, value)
    }

    pub fn ge(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Ge, value)
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Gt, value)
    }

    pub fn like(path: impl Into<String>, value: impl Into<Value>, mode: MatchMode) -> Self {
        Self::new(path, Operator::Like(mode), value)
    }

    pub fn not_like(path: impl Into<String>, value: impl Into<Value>, mode: MatchMode) -> Self {
        Self::new(path, Operator::NotLike(mode), value)
    }

    pub fn between(path: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        let mut p = Self::new(path, Operator::Between, low);
        p.value2 = high.into();
        p
    }

    pub fn is_null(path: impl Into<String>) -> Self {
        Self::new(path, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(path: impl Into<String>) -> Self {
        Self::new(path, Operator::IsNotNull, Value::Null)
    }

    pub fn in_<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut p = Self::new(path, Operator::In, Value::Null);
        p.in_values = values.into_iter().map(Into::into).collect();
        p
    }

    pub fn not_in<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut p = Self::in_(path, values);
        p.operator = Operator::NotIn;
        p
    }
}

/// An ordered list of predicates.
///
/// How the predicates combine (AND or OR) is decided by the builder method
/// that attaches the group to a criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub predicates: Vec<Predicate>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::eq(path, value))
    }

    pub fn ne(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::ne(path, value))
    }

    pub fn le(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::le(path, value))
    }

    pub fn lt(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::lt(path, value))
    }

    pub fn ge(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::ge(path, value))
    }

    pub fn gt(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::gt(path, value))
    }

    pub fn like(self, path: impl Into<String>, value: impl Into<Value>, mode: MatchMode) -> Self {
        self.with(Predicate::like(path, value, mode))
    }

    pub fn is_null(self, path: impl Into<String>) -> Self {
        self.with(Predicate::is_null(path))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.predicates.iter()
    }
}

impl FromIterator<Predicate> for ConditionGroup {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self {
            predicates: iter.into_iter().collect(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// An ordering directive on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}
