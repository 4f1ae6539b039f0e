//! Predicate to backend condition translation.
//!
//! Field paths are resolved against the model's capability table, then
//! rewritten into suffix-style lookups:
//!
//! | operator | condition |
//! |---|---|
//! | `Eq` / `Ne` | `col__exact`, negated for `Ne` |
//! | `Le` / `Lt` / `Ge` / `Gt` | `col__lte` / `col__lt` / `col__gte` / `col__gt` |
//! | `Like(m)` / `NotLike(m)` | `col__<m>`, negated for `NotLike` |
//! | `Between` | `col__gte AND col__lte` |
//! | `IsNull` / `IsNotNull` | `col__isnull = true` / `false` |
//! | `In` / `NotIn` | `col__in`, negated for `NotIn` |

use std::sync::LazyLock;

use regex::Regex;
use tenantorm_core::field::{find_field, tenant_filter_field};
use tenantorm_core::{
    Cond, ConditionGroup, Error, FieldInfo, Lookup, Operator, OrderBy, Predicate, Result,
    TenantContext, Value,
};

static RAW_EXPR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*?(__[a-z]+)?$").ok());

/// Resolve a field path to its backend column.
///
/// Paths may name the field or its column. To-many associations have no
/// column and cannot be filtered on.
pub fn resolve_column(fields: &[FieldInfo], path: &str) -> Result<&'static str> {
    match find_field(fields, path) {
        Some(field) if field.is_queryable() => Ok(field.column),
        Some(field) => Err(Error::config(format!(
            "field '{}' is a to-many association and cannot be used in a condition",
            field.name
        ))),
        None => Err(Error::config(format!("unknown field path '{path}'"))),
    }
}

/// Check that a pre-suffixed expression has the `column[__lookup]` shape.
pub fn check_raw_expr(expr: &str) -> Result<()> {
    let valid = RAW_EXPR.as_ref().is_some_and(|re| re.is_match(expr));
    if !valid {
        return Err(Error::config(format!("malformed filter expression '{expr}'")));
    }
    let (_, lookup) = Lookup::split(expr);
    if lookup == Lookup::Exact && expr.contains("__") && !expr.ends_with("__exact") {
        return Err(Error::config(format!("unknown lookup in '{expr}'")));
    }
    Ok(())
}

fn lookup_filter(column: &str, lookup: Lookup, value: Value, negated: bool) -> Cond {
    let expr = lookup.apply(column);
    if negated {
        Cond::exclude(expr, value)
    } else {
        Cond::filter(expr, value)
    }
}

fn match_filter(column: &str, suffix: &str, value: Value, negated: bool) -> Cond {
    let expr = format!("{column}__{suffix}");
    if negated {
        Cond::exclude(expr, value)
    } else {
        Cond::filter(expr, value)
    }
}

/// Translate a single predicate.
pub fn translate_predicate(fields: &[FieldInfo], predicate: &Predicate) -> Result<Cond> {
    let column = resolve_column(fields, &predicate.path)?;
    let value = predicate.value.clone();

    let cond = match predicate.operator {
        Operator::Eq => lookup_filter(column, Lookup::Exact, value, false),
        Operator::Ne => lookup_filter(column, Lookup::Exact, value, true),
        Operator::Le => lookup_filter(column, Lookup::Lte, value, false),
        Operator::Lt => lookup_filter(column, Lookup::Lt, value, false),
        Operator::Ge => lookup_filter(column, Lookup::Gte, value, false),
        Operator::Gt => lookup_filter(column, Lookup::Gt, value, false),
        Operator::Like(mode) => match_filter(column, mode.lookup(), value, false),
        Operator::NotLike(mode) => match_filter(column, mode.lookup(), value, true),
        Operator::Between => Cond::And(vec![
            lookup_filter(column, Lookup::Gte, value, false),
            lookup_filter(column, Lookup::Lte, predicate.value2.clone(), false),
        ]),
        Operator::IsNull => lookup_filter(column, Lookup::IsNull, Value::Bool(true), false),
        Operator::IsNotNull => lookup_filter(column, Lookup::IsNull, Value::Bool(false), false),
        Operator::In => lookup_filter(
            column,
            Lookup::In,
            Value::Array(predicate.in_values.clone()),
            false,
        ),
        Operator::NotIn => lookup_filter(
            column,
            Lookup::In,
            Value::Array(predicate.in_values.clone()),
            true,
        ),
    };
    Ok(cond)
}

/// All predicates of the group must hold.
pub fn translate_and(fields: &[FieldInfo], group: &ConditionGroup) -> Result<Cond> {
    group
        .iter()
        .try_fold(Cond::all(), |acc, p| Ok(acc.and(translate_predicate(fields, p)?)))
}

/// Any predicate of the group must hold.
pub fn translate_or(fields: &[FieldInfo], group: &ConditionGroup) -> Result<Cond> {
    let children = group
        .iter()
        .map(|p| translate_predicate(fields, p))
        .collect::<Result<Vec<_>>>()?;
    Ok(Cond::Or(children))
}

/// Resolve ordering paths to columns.
pub fn translate_order(fields: &[FieldInfo], order: &[OrderBy]) -> Result<Vec<OrderBy>> {
    order
        .iter()
        .map(|o| {
            Ok(OrderBy {
                column: resolve_column(fields, &o.column)?.to_string(),
                order: o.order,
            })
        })
        .collect()
}

/// The implicit `tenant = current` condition, if one applies.
///
/// Nothing is injected when the context has no tenant, ignores filtering,
/// or the model has no tenant field eligible for filtering.
pub fn tenant_filter(fields: &[FieldInfo], ctx: &TenantContext) -> Option<Cond> {
    let tenant = ctx.filter_tenant()?;
    let field = tenant_filter_field(fields)?;
    Some(Cond::filter(Lookup::Exact.apply(field.column), tenant))
}
