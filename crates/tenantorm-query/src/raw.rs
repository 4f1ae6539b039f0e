//! Raw query escape hatch.
//!
//! For queries the criteria builder cannot express. The query text and its
//! positional parameters are passed to the backend untouched: no tenant
//! filter is injected.

use crate::source::{QuerySource, execute};
use tenantorm_core::{Error, Model, QueryError, QueryErrorKind, Result, Row, Value};

/// A hand-written query with positional parameters.
pub struct RawQuery<'s> {
    source: &'s mut dyn QuerySource,
    sql: String,
    params: Vec<Value>,
}

impl<'s> RawQuery<'s> {
    pub fn new(source: &'s mut dyn QuerySource, sql: impl Into<String>) -> Self {
        Self {
            source,
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind the next positional parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    #[must_use]
    pub fn bind_all(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(values);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn run(self) -> Result<Vec<Row>> {
        tracing::debug!(sql = %self.sql, params = self.params.len(), "Executing raw query");
        let Self {
            source,
            sql,
            params,
        } = self;
        execute(source, |conn| conn.raw_query(&sql, &params))
    }

    /// The first row, if any.
    pub fn one(self) -> Result<Option<Row>> {
        Ok(self.run()?.into_iter().next())
    }

    /// Every row.
    pub fn all(self) -> Result<Vec<Row>> {
        self.run()
    }

    /// One column of every row.
    pub fn values_flat(self, column: &str) -> Result<Vec<Value>> {
        let sql = self.sql.clone();
        self.run()?
            .iter()
            .map(|row| {
                row.get_by_name(column).cloned().ok_or_else(|| {
                    Error::Query(
                        QueryError::new(
                            QueryErrorKind::NotFound,
                            format!("column '{column}' not in raw query result"),
                        )
                        .with_statement(sql.clone()),
                    )
                })
            })
            .collect()
    }

    /// Every row decoded as a model.
    pub fn rows_into<M: Model>(self) -> Result<Vec<M>> {
        let rows = self.run()?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut item = M::from_row(row)?;
            item.after_load()?;
            items.push(item);
        }
        Ok(items)
    }

    /// Every row passed through a custom transform.
    pub fn map<T>(self, f: impl FnMut(&Row) -> Result<T>) -> Result<Vec<T>> {
        self.run()?.iter().map(f).collect()
    }
}

impl std::fmt::Debug for RawQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawQuery")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
