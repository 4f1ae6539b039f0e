//! What a criteria executes against.
//!
//! The session implements [`QuerySource`]; criteria, raw queries and
//! association loads only ever see this trait.

use crate::translate::tenant_filter;
use tenantorm_core::field::primary_key;
use tenantorm_core::{
    AssociationLoader, Cond, Connection, Entity, Error, FieldInfo, Lookup, OrderBy, Result, Row,
    TableQuery, TenantContext,
};

/// Tenant context plus a backend handle.
pub trait QuerySource {
    /// The tenant scope reads are filtered by.
    fn context(&self) -> &TenantContext;

    /// The live backend connection, opening it if necessary.
    fn connection(&mut self) -> Result<&mut dyn Connection>;

    /// Called when a backend call fails.
    fn record_failure(&mut self, _error: &Error) {}
}

/// Run a backend call, reporting failures to the source.
pub fn execute<T>(
    source: &mut dyn QuerySource,
    f: impl FnOnce(&mut dyn Connection) -> Result<T>,
) -> Result<T> {
    let result = source.connection().and_then(f);
    if let Err(e) = &result {
        source.record_failure(e);
    }
    result
}

/// Resolves associations through a [`QuerySource`], applying its tenant filter.
pub struct ScopedLoader<'a> {
    source: &'a mut dyn QuerySource,
    report_failures: bool,
}

impl<'a> ScopedLoader<'a> {
    pub fn new(source: &'a mut dyn QuerySource) -> Self {
        Self {
            source,
            report_failures: true,
        }
    }

    /// A loader whose failures are returned to the caller only, never
    /// recorded on the source.
    pub fn tolerant(source: &'a mut dyn QuerySource) -> Self {
        Self {
            source,
            report_failures: false,
        }
    }

    fn run<T>(&mut self, f: impl FnOnce(&mut dyn Connection) -> Result<T>) -> Result<T> {
        if self.report_failures {
            execute(&mut *self.source, f)
        } else {
            self.source.connection().and_then(f)
        }
    }

    fn scoped(&self, fields: &[FieldInfo], query: TableQuery) -> TableQuery {
        match tenant_filter(fields, self.source.context()) {
            Some(cond) => query.filter(cond),
            None => query,
        }
    }
}

fn pk_column(fields: &[FieldInfo]) -> &'static str {
    primary_key(fields).map_or("id", |f| f.column)
}

impl AssociationLoader for ScopedLoader<'_> {
    fn load_by_id(
        &mut self,
        table: &'static str,
        fields: &'static [FieldInfo],
        id: i64,
    ) -> Result<Option<Row>> {
        let query = self.scoped(
            fields,
            TableQuery::new(table)
                .filter(Cond::filter(Lookup::Exact.apply(pk_column(fields)), id))
                .limit(1),
        );
        let rows = self.run(|conn| conn.query(&query))?;
        Ok(rows.into_iter().next())
    }

    fn load_by_column(
        &mut self,
        table: &'static str,
        fields: &'static [FieldInfo],
        column: &str,
        owner_id: i64,
    ) -> Result<Vec<Row>> {
        let query = self.scoped(
            fields,
            TableQuery::new(table)
                .filter(Cond::filter(Lookup::Exact.apply(column), owner_id))
                .order_by(OrderBy::asc(pk_column(fields))),
        );
        self.run(|conn| conn.query(&query))
    }
}

/// Load one association of `entity` by field name.
///
/// Returns whether anything was loaded.
pub fn load_association(
    source: &mut dyn QuerySource,
    entity: &mut dyn Entity,
    name: &str,
) -> Result<bool> {
    let type_name = entity.type_name();
    let owner_id = entity.id();
    let mut loader = ScopedLoader::new(source);
    for assoc in entity.associations_mut() {
        if assoc.field.name == name {
            tracing::debug!(entity = type_name, field = name, owner_id, "Loading association");
            return assoc
                .association
                .load(&mut loader, owner_id, assoc.field.remote_column);
        }
    }
    Err(Error::config(format!(
        "{type_name} has no association named '{name}'"
    )))
}
