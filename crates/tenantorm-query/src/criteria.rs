//! Criteria builder.
//!
//! A [`Criteria`] collects predicates, composed groups, ordering and paging
//! for one model type, then executes through a [`QuerySource`]. Field paths
//! are checked as they are added; the first problem is recorded and every
//! terminal call returns it without touching the backend.

use std::marker::PhantomData;

use tenantorm_core::{
    Cond, ConditionGroup, Error, FieldKind, MatchMode, Model, OrderBy, Predicate, Result, Row,
    TableQuery, Value,
};

use crate::clause::{Clause, Where};
use crate::page::Page;
use crate::source::{QuerySource, execute, load_association};
use crate::translate::{check_raw_expr, resolve_column, tenant_filter, translate_order};

/// A list result together with the total row count of the same filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<M> {
    pub items: Vec<M>,
    pub total: u64,
}

impl<M> Listing<M> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A composable query against one model type.
///
/// # Example
///
/// ```ignore
/// let open = session
///     .criteria::<Ticket>()
///     .eq("status", "open")
///     .between("priority", 2, 4)
///     .or(ConditionGroup::new().eq("owner", 7).is_null("owner"))
///     .order_desc("created_at")
///     .list()?;
/// ```
pub struct Criteria<'s, M: Model> {
    source: &'s mut dyn QuerySource,
    clause: Where,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    related: Vec<&'static str>,
    error: Option<Error>,
    _marker: PhantomData<fn() -> M>,
}

impl<'s, M: Model> Criteria<'s, M> {
    pub fn new(source: &'s mut dyn QuerySource) -> Self {
        Self {
            source,
            clause: Where::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            related: Vec::new(),
            error: None,
            _marker: PhantomData,
        }
    }

    /// The first configuration error recorded while building, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn record(&mut self, err: Error) {
        if self.error.is_none() {
            tracing::debug!(table = M::TABLE_NAME, error = %err, "Criteria misconfigured");
            self.error = Some(err);
        }
    }

    fn check_group(&mut self, group: &ConditionGroup) -> bool {
        for predicate in group.iter() {
            if let Err(e) = resolve_column(M::fields(), &predicate.path) {
                self.record(e);
                return false;
            }
        }
        true
    }

    fn with(mut self, predicate: Predicate) -> Self {
        match resolve_column(M::fields(), &predicate.path) {
            Ok(_) => self.clause.group.push(predicate),
            Err(e) => self.record(e),
        }
        self
    }

    // ========================================================================
    // Predicates
    // ========================================================================

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

    pub fn not_like(
        self,
        path: impl Into<String>,
        value: impl Into<Value>,
        mode: MatchMode,
    ) -> Self {
        self.with(Predicate::not_like(path, value, mode))
    }

    /// Inclusive range: `low <= path <= high`.
    pub fn between(
        self,
        path: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.with(Predicate::between(path, low, high))
    }

    pub fn is_null(self, path: impl Into<String>) -> Self {
        self.with(Predicate::is_null(path))
    }

    pub fn is_not_null(self, path: impl Into<String>) -> Self {
        self.with(Predicate::is_not_null(path))
    }

    pub fn in_<I, V>(self, path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(Predicate::in_(path, values))
    }

    pub fn not_in<I, V>(self, path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(Predicate::not_in(path, values))
    }

    /// Conjoin a condition already in backend `column__lookup` form.
    pub fn filter_raw(mut self, expr: impl Into<String>, value: impl Into<Value>) -> Self {
        let expr = expr.into();
        match check_raw_expr(&expr) {
            Ok(()) => self
                .clause
                .push(Clause::Raw(Cond::filter(expr, value))),
            Err(e) => self.record(e),
        }
        self
    }

    // ========================================================================
    // Composed groups
    // ========================================================================

    /// Conjoin a group whose predicates are ORed together.
    pub fn or(mut self, group: ConditionGroup) -> Self {
        if self.check_group(&group) {
            self.clause.push(Clause::Or(group));
        }
        self
    }

    /// Conjoin `(g1a AND g1b) OR (g2a AND g2b) OR ...`.
    pub fn and_or(mut self, groups: Vec<ConditionGroup>) -> Self {
        if groups.iter().all(|g| self.check_group(g)) {
            self.clause.push(Clause::AndOr(groups));
        }
        self
    }

    /// Conjoin `(g1a OR g1b) AND (g2a OR g2b) AND ...`.
    pub fn or_and(mut self, groups: Vec<ConditionGroup>) -> Self {
        if groups.iter().all(|g| self.check_group(g)) {
            self.clause.push(Clause::OrAnd(groups));
        }
        self
    }

    // ========================================================================
    // Ordering and paging
    // ========================================================================

    pub fn order_asc(self, path: impl Into<String>) -> Self {
        self.push_order(OrderBy::asc(path))
    }

    pub fn order_desc(self, path: impl Into<String>) -> Self {
        self.push_order(OrderBy::desc(path))
    }

    fn push_order(mut self, order: OrderBy) -> Self {
        match resolve_column(M::fields(), &order.column) {
            Ok(_) => self.order.push(order),
            Err(e) => self.record(e),
        }
        self
    }

    /// Import a page's filters, sort and offset/limit.
    pub fn set_page(mut self, page: &Page) -> Self {
        let before = self.clause.clone();
        page.apply_filters(&mut self.clause);
        if let Err(e) = self.clause.build(M::fields()) {
            self.clause = before;
            self.record(e);
            return self;
        }
        if let Some(order) = page.order_by() {
            self = self.push_order(order);
        }
        if page.limit > 0 {
            self.limit = Some(page.limit);
        }
        if page.offset > 0 {
            self.offset = Some(page.offset);
        }
        self
    }

    pub fn set_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn set_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Load the named associations of every returned entity.
    pub fn set_related_sel<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            match M::fields()
                .iter()
                .find(|f| f.name == name && f.kind != FieldKind::Column)
            {
                Some(field) => self.related.push(field.name),
                None => self.record(Error::config(format!(
                    "{} has no association named '{name}'",
                    M::TYPE_NAME
                ))),
            }
        }
        self
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Assemble the backend query: hooks, translation, then the tenant scope.
    fn build(&mut self) -> Result<TableQuery> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let fields = M::fields();

        M::before_criteria(&mut self.clause.group);
        let cond = self.clause.build(fields)?;

        let mut query = TableQuery::new(M::TABLE_NAME).filter(cond);
        query.order = translate_order(fields, &self.order)?;
        query.limit = self.limit;
        query.offset = self.offset;
        query.distinct = self.distinct;
        query.related = self.related.iter().map(|s| (*s).to_string()).collect();

        M::before_query(&mut query);

        if let Some(scope) = tenant_filter(fields, self.source.context()) {
            query = query.filter(scope);
        }
        tracing::trace!(table = M::TABLE_NAME, cond = %query.cond, "Built criteria query");
        Ok(query)
    }

    fn hydrate(&mut self, rows: &[Row]) -> Result<Vec<M>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let mut item = M::from_row(row)?;
            item.after_load()?;
            for name in &self.related {
                load_association(&mut *self.source, &mut item, name)?;
            }
            items.push(item);
        }
        Ok(items)
    }

    /// Load a single entity. No match is `Ok(None)`.
    #[tracing::instrument(level = "debug", skip(self), fields(table = M::TABLE_NAME))]
    pub fn one(mut self) -> Result<Option<M>> {
        self.limit = Some(1);
        let query = self.build()?;
        let rows = execute(&mut *self.source, |conn| conn.query(&query))?;
        let found = self.hydrate(&rows[..rows.len().min(1)])?.into_iter().next();
        tracing::debug!(found = found.is_some(), "Loaded one");
        Ok(found)
    }

    /// Like [`one`](Self::one), but an absent row yields an unpersisted default.
    pub fn one_or_default(self) -> Result<M> {
        Ok(self.one()?.unwrap_or_default())
    }

    /// The first entity by the declared order, or by primary key.
    pub fn first(mut self) -> Result<Option<M>> {
        if self.order.is_empty() {
            self.order.push(OrderBy::asc(M::primary_key_column()));
        }
        self.one()
    }

    /// Load every matching entity.
    #[tracing::instrument(level = "debug", skip(self), fields(table = M::TABLE_NAME))]
    pub fn list(mut self) -> Result<Vec<M>> {
        let query = self.build()?;
        let rows = execute(&mut *self.source, |conn| conn.query(&query))?;
        let mut items = self.hydrate(&rows)?;
        M::after_list(&mut items);
        tracing::debug!(count = items.len(), "Loaded list");
        Ok(items)
    }

    /// Count matching rows.
    #[tracing::instrument(level = "debug", skip(self), fields(table = M::TABLE_NAME))]
    pub fn count(mut self) -> Result<u64> {
        let query = self.build()?.for_count();
        execute(&mut *self.source, |conn| conn.count(&query))
    }

    pub fn exists(self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// A page of entities plus the unpaged total for the same filter.
    #[tracing::instrument(level = "debug", skip(self), fields(table = M::TABLE_NAME))]
    pub fn list_and_count(mut self) -> Result<Listing<M>> {
        let query = self.build()?;
        let rows = execute(&mut *self.source, |conn| conn.query(&query))?;
        let mut items = self.hydrate(&rows)?;
        M::after_list(&mut items);
        let count_query = query.for_count();
        let total = execute(&mut *self.source, |conn| conn.count(&count_query))?;
        Ok(Listing { items, total })
    }

    /// Delete every matching row. Returns the affected count.
    #[tracing::instrument(level = "debug", skip(self), fields(table = M::TABLE_NAME))]
    pub fn delete(mut self) -> Result<u64> {
        let query = self.build()?.for_count();
        let affected = execute(&mut *self.source, |conn| conn.delete_where(&query))?;
        tracing::debug!(affected, "Bulk delete");
        Ok(affected)
    }

    /// Set `fields` on every matching row. Returns the affected count.
    ///
    /// Field paths resolve like predicate paths; the primary key cannot be
    /// assigned.
    #[tracing::instrument(level = "debug", skip(self, fields), fields(table = M::TABLE_NAME))]
    pub fn update<I, K, V>(mut self, fields: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut values = Vec::new();
        for (path, value) in fields {
            let column = resolve_column(M::fields(), path.as_ref())?;
            if column == M::primary_key_column() {
                return Err(Error::config(format!(
                    "cannot bulk-assign primary key '{column}' of {}",
                    M::TYPE_NAME
                )));
            }
            values.push((column.to_string(), value.into()));
        }
        if values.is_empty() {
            return Err(Error::config("bulk update needs at least one field"));
        }
        let query = self.build()?.for_count();
        let affected = execute(&mut *self.source, |conn| conn.update_where(&query, &values))?;
        tracing::debug!(affected, "Bulk update");
        Ok(affected)
    }
}

impl<M: Model> std::fmt::Debug for Criteria<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criteria")
            .field("table", &M::TABLE_NAME)
            .field("clause", &self.clause)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("distinct", &self.distinct)
            .field("related", &self.related)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
