//! Backend execution surface.
//!
//! This module defines what a storage backend must supply:
//!
//! - [`TableQuery`] - a table-scoped query (condition, ordering, paging, distinct)
//! - [`Connection`] - terminal execution (rows, count, bulk update/delete),
//!   single-row writes, transactions and the raw query escape hatch
//!
//! The surface is synchronous: the only blocking point is the backend call.

use crate::cond::Cond;
use crate::error::Result;
use crate::predicate::OrderBy;
use crate::row::Row;
use crate::value::Value;

/// A table-scoped query handed to a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub cond: Cond,
    /// Applied in declaration order.
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    /// Associations the caller wants pre-loaded alongside the rows.
    pub related: Vec<String>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Conjoin a condition.
    #[must_use]
    pub fn filter(mut self, cond: Cond) -> Self {
        self.cond = std::mem::take(&mut self.cond).and(cond);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The same query without ordering and paging, for counting.
    pub fn for_count(&self) -> Self {
        Self {
            table: self.table.clone(),
            cond: self.cond.clone(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: self.distinct,
            related: Vec::new(),
        }
    }
}

/// A storage backend connection.
///
/// Implementations own their transaction state: `begin` starts one,
/// `commit` publishes it and `rollback` discards it. Outside a transaction
/// every write is applied immediately.
///
/// # Example
///
/// ```rust,ignore
/// let q = TableQuery::new("users").filter(Cond::filter("age__gte", 18));
/// let rows = conn.query(&q)?;
/// conn.begin()?;
/// conn.insert("users", "id", &row)?;
/// conn.commit()?;
/// ```
pub trait Connection {
    /// Execute a query and return all matching rows.
    fn query(&mut self, query: &TableQuery) -> Result<Vec<Row>>;

    /// Count rows matching a query (ordering and paging ignored).
    fn count(&mut self, query: &TableQuery) -> Result<u64>;

    /// Insert a row and return the generated primary key.
    ///
    /// A positive value in the `pk` column is kept as the id.
    fn insert(&mut self, table: &str, pk: &str, row: &Row) -> Result<i64>;

    /// Replace the row whose `pk` column equals `id`, provided it also
    /// matches `scope`. Returns rows affected.
    fn update(&mut self, table: &str, pk: &str, id: i64, scope: &Cond, row: &Row) -> Result<u64>;

    /// Delete the row whose `pk` column equals `id`, provided it also matches
    /// `scope`. Returns rows affected.
    fn delete(&mut self, table: &str, pk: &str, id: i64, scope: &Cond) -> Result<u64>;

    /// Assign `values` on every row matching the query. Returns rows affected.
    fn update_where(&mut self, query: &TableQuery, values: &[(String, Value)]) -> Result<u64>;

    /// Delete every row matching the query. Returns rows affected.
    fn delete_where(&mut self, query: &TableQuery) -> Result<u64>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    /// Execute hand-written query text with positional parameters.
    fn raw_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn query(&mut self, query: &TableQuery) -> Result<Vec<Row>> {
        (**self).query(query)
    }

    fn count(&mut self, query: &TableQuery) -> Result<u64> {
        (**self).count(query)
    }

    fn insert(&mut self, table: &str, pk: &str, row: &Row) -> Result<i64> {
        (**self).insert(table, pk, row)
    }

    fn update(&mut self, table: &str, pk: &str, id: i64, scope: &Cond, row: &Row) -> Result<u64> {
        (**self).update(table, pk, id, scope, row)
    }

    fn delete(&mut self, table: &str, pk: &str, id: i64, scope: &Cond) -> Result<u64> {
        (**self).delete(table, pk, id, scope)
    }

    fn update_where(&mut self, query: &TableQuery, values: &[(String, Value)]) -> Result<u64> {
        (**self).update_where(query, values)
    }

    fn delete_where(&mut self, query: &TableQuery) -> Result<u64> {
        (**self).delete_where(query)
    }

    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }

    fn in_transaction(&self) -> bool {
        (**self).in_transaction()
    }

    fn raw_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).raw_query(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::OrderBy;

    #[test]
    fn filter_conjoins() {
        let q = TableQuery::new("users")
            .filter(Cond::filter("a", 1))
            .filter(Cond::filter("b__gt", 2));
        assert_eq!(
            q.cond,
            Cond::And(vec![Cond::filter("a", 1), Cond::filter("b__gt", 2)])
        );
    }

    #[test]
    fn count_query_drops_paging() {
        let q = TableQuery::new("users")
            .order_by(OrderBy::desc("id"))
            .limit(10)
            .offset(20);
        let c = q.for_count();
        assert!(c.order.is_empty());
        assert_eq!(c.limit, None);
        assert_eq!(c.offset, None);
        assert_eq!(c.table, "users");
    }
}
