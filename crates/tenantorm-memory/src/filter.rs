//! Condition evaluation against stored rows.

use std::cmp::Ordering;

use regex::RegexBuilder;
use tenantorm_core::{
    Cond, Error, Lookup, OrderBy, QueryError, QueryErrorKind, Result, Row, SortOrder, Value,
};

fn missing_column(column: &str) -> Error {
    Error::Query(QueryError::new(
        QueryErrorKind::NotFound,
        format!("no such column: {column}"),
    ))
}

/// Evaluate a condition tree against one row.
pub fn matches(cond: &Cond, row: &Row) -> Result<bool> {
    match cond {
        Cond::Filter {
            expr,
            value,
            negated,
        } => {
            let (column, lookup) = Lookup::split(expr);
            let cell = row.get_by_name(column).ok_or_else(|| missing_column(column))?;
            Ok(eval_lookup(lookup, cell, value)? != *negated)
        }
        Cond::And(children) => {
            for child in children {
                if !matches(child, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Cond::Or(children) => {
            for child in children {
                if matches(child, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Cond::Not(inner) => Ok(!matches(inner, row)?),
    }
}

enum TextMatch {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

fn text_match(
    cell: &Value,
    value: &Value,
    mode: TextMatch,
    case_insensitive: bool,
) -> Result<bool> {
    let (Some(haystack), Some(needle)) = (cell.as_str(), value.as_str()) else {
        return Ok(false);
    };
    if !case_insensitive {
        return Ok(match mode {
            TextMatch::Exact => haystack == needle,
            TextMatch::Contains => haystack.contains(needle),
            TextMatch::StartsWith => haystack.starts_with(needle),
            TextMatch::EndsWith => haystack.ends_with(needle),
        });
    }
    let escaped = regex::escape(needle);
    let pattern = match mode {
        TextMatch::Exact => format!("^{escaped}$"),
        TextMatch::Contains => escaped,
        TextMatch::StartsWith => format!("^{escaped}"),
        TextMatch::EndsWith => format!("{escaped}$"),
    };
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            Error::Query(QueryError::new(
                QueryErrorKind::Unsupported,
                format!("cannot match '{needle}': {e}"),
            ))
        })?;
    Ok(re.is_match(haystack))
}

fn ordering_is(cell: &Value, value: &Value, accept: fn(Ordering) -> bool) -> bool {
    cell.sql_cmp(value).is_some_and(accept)
}

/// Evaluate one lookup. NULL cells only satisfy `isnull` and `exact NULL`.
pub fn eval_lookup(lookup: Lookup, cell: &Value, value: &Value) -> Result<bool> {
    let result = match lookup {
        Lookup::Exact if value.is_null() => cell.is_null(),
        Lookup::Exact => cell.sql_eq(value),
        Lookup::IExact => text_match(cell, value, TextMatch::Exact, true)?,
        Lookup::Contains => text_match(cell, value, TextMatch::Contains, false)?,
        Lookup::IContains => text_match(cell, value, TextMatch::Contains, true)?,
        Lookup::StartsWith => text_match(cell, value, TextMatch::StartsWith, false)?,
        Lookup::IStartsWith => text_match(cell, value, TextMatch::StartsWith, true)?,
        Lookup::EndsWith => text_match(cell, value, TextMatch::EndsWith, false)?,
        Lookup::IEndsWith => text_match(cell, value, TextMatch::EndsWith, true)?,
        Lookup::Gt => ordering_is(cell, value, Ordering::is_gt),
        Lookup::Gte => ordering_is(cell, value, Ordering::is_ge),
        Lookup::Lt => ordering_is(cell, value, Ordering::is_lt),
        Lookup::Lte => ordering_is(cell, value, Ordering::is_le),
        Lookup::In => match value {
            Value::Array(items) => items.iter().any(|item| cell.sql_eq(item)),
            other => {
                return Err(Error::Query(QueryError::new(
                    QueryErrorKind::Unsupported,
                    format!("'in' lookup needs an array, got {}", other.type_name()),
                )));
            }
        },
        Lookup::IsNull => {
            let want_null = value.as_bool().ok_or_else(|| {
                Error::Query(QueryError::new(
                    QueryErrorKind::Unsupported,
                    format!("'isnull' lookup needs a bool, got {}", value.type_name()),
                ))
            })?;
            cell.is_null() == want_null
        }
    };
    Ok(result)
}

/// Compare two rows by a list of ordering directives. NULLs sort first.
pub fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for directive in order {
        let left = a.get_by_name(&directive.column).unwrap_or(&Value::Null);
        let right = b.get_by_name(&directive.column).unwrap_or(&Value::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.sql_cmp(right).unwrap_or(Ordering::Equal),
        };
        let ord = match directive.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
