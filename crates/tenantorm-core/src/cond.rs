//! Backend condition trees.
//!
//! A [`Cond`] is what a [`Connection`](crate::Connection) evaluates. Leaf
//! filters use suffix-style expressions: `age__lte`, `name__icontains`,
//! `deleted_at__isnull`. A bare column (`status`) means `status__exact`.

use crate::value::Value;
use std::fmt;

/// A lookup suffix on a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl Lookup {
    const ALL: [Lookup; 14] = [
        Lookup::Exact,
        Lookup::IExact,
        Lookup::Contains,
        Lookup::IContains,
        Lookup::StartsWith,
        Lookup::IStartsWith,
        Lookup::EndsWith,
        Lookup::IEndsWith,
        Lookup::Gt,
        Lookup::Gte,
        Lookup::Lt,
        Lookup::Lte,
        Lookup::In,
        Lookup::IsNull,
    ];

    pub const fn suffix(self) -> &'static str {
        match self {
            Lookup::Exact => "exact",
            Lookup::IExact => "iexact",
            Lookup::Contains => "contains",
            Lookup::IContains => "icontains",
            Lookup::StartsWith => "startswith",
            Lookup::IStartsWith => "istartswith",
            Lookup::EndsWith => "endswith",
            Lookup::IEndsWith => "iendswith",
            Lookup::Gt => "gt",
            Lookup::Gte => "gte",
            Lookup::Lt => "lt",
            Lookup::Lte => "lte",
            Lookup::In => "in",
            Lookup::IsNull => "isnull",
        }
    }

    /// Comparison symbol for the ordering lookups.
    pub const fn sql_operator(self) -> Option<&'static str> {
        match self {
            Lookup::Exact => Some("="),
            Lookup::Gt => Some(">"),
            Lookup::Gte => Some(">="),
            Lookup::Lt => Some("<"),
            Lookup::Lte => Some("<="),
            _ => None,
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.suffix() == suffix)
    }

    /// Split `column__lookup` into its parts.
    ///
    /// An unknown or missing suffix is treated as part of the column name
    /// with an exact lookup.
    pub fn split(expr: &str) -> (&str, Lookup) {
        if let Some((column, suffix)) = expr.rsplit_once("__") {
            if let Some(lookup) = Self::from_suffix(suffix) {
                return (column, lookup);
            }
        }
        (expr, Lookup::Exact)
    }

    /// Build `column__lookup`.
    pub fn apply(self, column: &str) -> String {
        format!("{}__{}", column, self.suffix())
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A condition tree evaluated by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    /// `expr` is `column` or `column__lookup`.
    Filter {
        expr: String,
        value: Value,
        negated: bool,
    },
    /// All children hold. An empty `And` always holds.
    And(Vec<Cond>),
    /// Any child holds. An empty `Or` never holds.
    Or(Vec<Cond>),
    Not(Box<Cond>),
}

impl Cond {
    pub fn filter(expr: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Filter {
            expr: expr.into(),
            value: value.into(),
            negated: false,
        }
    }

    pub fn exclude(expr: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Filter {
            expr: expr.into(),
            value: value.into(),
            negated: true,
        }
    }

    /// The always-true condition.
    pub fn all() -> Self {
        Cond::And(Vec::new())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Cond) -> Self {
        Cond::Not(Box::new(inner))
    }

    /// Conjoin `other`, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Cond) -> Self {
        match (self, other) {
            (Cond::And(mut a), Cond::And(b)) => {
                a.extend(b);
                Cond::And(a)
            }
            (Cond::And(mut a), other) => {
                a.push(other);
                Cond::And(a)
            }
            (this, Cond::And(mut b)) => {
                b.insert(0, this);
                Cond::And(b)
            }
            (this, other) => Cond::And(vec![this, other]),
        }
    }

    pub fn is_trivially_true(&self) -> bool {
        matches!(self, Cond::And(children) if children.is_empty())
    }

    /// Visit every leaf filter.
    pub fn for_each_filter<'a>(&'a self, f: &mut impl FnMut(&'a str, &'a Value, bool)) {
        match self {
            Cond::Filter {
                expr,
                value,
                negated,
            } => f(expr, value, *negated),
            Cond::And(children) | Cond::Or(children) => {
                for child in children {
                    child.for_each_filter(f);
                }
            }
            Cond::Not(inner) => inner.for_each_filter(f),
        }
    }
}

impl Default for Cond {
    fn default() -> Self {
        Cond::all()
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cond::Filter {
                expr,
                value,
                negated,
            } => {
                if *negated {
                    write!(f, "NOT {}={:?}", expr, value)
                } else {
                    write!(f, "{}={:?}", expr, value)
                }
            }
            Cond::And(children) | Cond::Or(children) => {
                let sep = if matches!(self, Cond::And(_)) { " AND " } else { " OR " };
                if children.is_empty() {
                    return f.write_str(if matches!(self, Cond::And(_)) { "TRUE" } else { "FALSE" });
                }
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Cond::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_known_suffix() {
        assert_eq!(Lookup::split("age__lte"), ("age", Lookup::Lte));
        assert_eq!(Lookup::split("name__icontains"), ("name", Lookup::IContains));
        assert_eq!(Lookup::split("status"), ("status", Lookup::Exact));
    }

    #[test]
    fn split_unknown_suffix_keeps_column() {
        assert_eq!(Lookup::split("created__by"), ("created__by", Lookup::Exact));
        assert_eq!(Lookup::split("a__b__gt"), ("a__b", Lookup::Gt));
    }

    #[test]
    fn comparison_symbols() {
        assert_eq!(Lookup::Lte.sql_operator(), Some("<="));
        assert_eq!(Lookup::Lt.sql_operator(), Some("<"));
        assert_eq!(Lookup::Gte.sql_operator(), Some(">="));
        assert_eq!(Lookup::Gt.sql_operator(), Some(">"));
        assert_eq!(Lookup::IContains.sql_operator(), None);
    }

    #[test]
    fn and_flattens() {
        let c = Cond::filter("a", 1).and(Cond::filter("b", 2)).and(Cond::filter("c", 3));
        match c {
            Cond::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
        assert!(Cond::all().is_trivially_true());
    }

    #[test]
    fn display_renders_tree() {
        let c = Cond::Or(vec![Cond::filter("a", 1), Cond::exclude("b__in", vec![2i64])]);
        assert_eq!(c.to_string(), "(a=Int(1) OR NOT b__in=Array([BigInt(2)]))");
    }
}
