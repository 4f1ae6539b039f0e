//! `Connection` implementation over a [`MemoryDatabase`].

use tenantorm_core::{
    Cond, Connection, Error, QueryError, QueryErrorKind, Result, Row, TableQuery,
    TransactionError, TransactionErrorKind, Value,
};

use crate::database::{MemoryDatabase, OpKind, Operation, Tables};
use crate::filter::{compare_rows, matches};

/// A connection to a [`MemoryDatabase`].
///
/// Outside a transaction every write lands in the shared store immediately.
/// `begin` takes a private copy of all tables; `commit` publishes the copy
/// (last commit wins) and `rollback` drops it.
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    tx: Option<Tables>,
}

impl MemoryConnection {
    pub(crate) fn new(db: MemoryDatabase) -> Self {
        Self { db, tx: None }
    }

    /// The database this connection writes to.
    pub fn database(&self) -> &MemoryDatabase {
        &self.db
    }

    fn with_tables<T>(&mut self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        match &mut self.tx {
            Some(tables) => f(tables),
            None => {
                let mut shared = self.db.lock();
                f(&mut shared.tables)
            }
        }
    }

    fn read<T>(&mut self, f: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        self.with_tables(|tables| f(tables))
    }
}

fn select(tables: &Tables, query: &TableQuery) -> Result<Vec<Row>> {
    let Some(table) = tables.get(&query.table) else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for row in table.rows.values() {
        if matches(&query.cond, row)? {
            rows.push(row.clone());
        }
    }

    if !query.order.is_empty() {
        rows.sort_by(|a, b| compare_rows(a, b, &query.order));
    }

    if query.distinct {
        let mut seen: Vec<Vec<Value>> = Vec::new();
        rows.retain(|row| {
            let values: Vec<Value> = row.values().cloned().collect();
            if seen.contains(&values) {
                false
            } else {
                seen.push(values);
                true
            }
        });
    }

    let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
    Ok(rows.into_iter().skip(offset).take(limit).collect())
}

/// Copy `row` with its primary key column set to `id`.
fn with_pk(row: &Row, pk: &str, id: i64) -> Row {
    let mut pairs: Vec<(String, Value)> = row
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    match pairs.iter_mut().find(|(name, _)| name == pk) {
        Some((_, value)) => *value = Value::BigInt(id),
        None => pairs.insert(0, (pk.to_string(), Value::BigInt(id))),
    }
    Row::from_pairs(pairs)
}

/// Copy `row` with `values` assigned; unknown columns are added.
fn assign(row: &Row, values: &[(String, Value)]) -> Row {
    let mut pairs: Vec<(String, Value)> = row
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    for (column, value) in values {
        match pairs.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value.clone(),
            None => pairs.push((column.clone(), value.clone())),
        }
    }
    Row::from_pairs(pairs)
}

fn tx_error(kind: TransactionErrorKind, message: &str) -> Error {
    Error::Transaction(TransactionError {
        kind,
        message: message.to_string(),
    })
}

impl Connection for MemoryConnection {
    fn query(&mut self, query: &TableQuery) -> Result<Vec<Row>> {
        self.db
            .record(Operation::new(OpKind::Query, &query.table, None));
        self.read(|tables| select(tables, query))
    }

    fn count(&mut self, query: &TableQuery) -> Result<u64> {
        self.db
            .record(Operation::new(OpKind::Count, &query.table, None));
        let unpaged = query.for_count();
        let rows = self.read(|tables| select(tables, &unpaged))?;
        Ok(rows.len() as u64)
    }

    fn insert(&mut self, table: &str, pk: &str, row: &Row) -> Result<i64> {
        let requested = row.get_by_name(pk).and_then(Value::as_i64).unwrap_or(0);
        let id = self.with_tables(|tables| {
            let stored = tables.entry(table.to_string()).or_default();
            if requested > 0 && stored.rows.contains_key(&requested) {
                return Err(Error::Query(
                    QueryError::new(
                        QueryErrorKind::Constraint,
                        format!("UNIQUE constraint failed: {table}.{pk}"),
                    )
                    .with_table(table),
                ));
            }
            let id = stored.allocate(requested);
            stored.rows.insert(id, with_pk(row, pk, id));
            Ok(id)
        })?;
        self.db
            .record(Operation::new(OpKind::Insert, table, Some(id)));
        Ok(id)
    }

    fn update(&mut self, table: &str, pk: &str, id: i64, scope: &Cond, row: &Row) -> Result<u64> {
        let affected = self.with_tables(|tables| {
            let Some(stored) = tables.get_mut(table) else {
                return Ok(0);
            };
            match stored.rows.get(&id) {
                Some(current) if matches(scope, current)? => {
                    stored.rows.insert(id, with_pk(row, pk, id));
                    Ok(1)
                }
                _ => Ok(0),
            }
        })?;
        self.db
            .record(Operation::new(OpKind::Update, table, Some(id)));
        Ok(affected)
    }

    fn delete(&mut self, table: &str, _pk: &str, id: i64, scope: &Cond) -> Result<u64> {
        let affected = self.with_tables(|tables| {
            let Some(stored) = tables.get_mut(table) else {
                return Ok(0);
            };
            match stored.rows.get(&id) {
                Some(current) if matches(scope, current)? => {
                    stored.rows.remove(&id);
                    Ok(1)
                }
                _ => Ok(0),
            }
        })?;
        self.db
            .record(Operation::new(OpKind::Delete, table, Some(id)));
        Ok(affected)
    }

    fn update_where(&mut self, query: &TableQuery, values: &[(String, Value)]) -> Result<u64> {
        let affected = self.with_tables(|tables| {
            let Some(stored) = tables.get_mut(&query.table) else {
                return Ok(0);
            };
            let mut affected = 0;
            for row in stored.rows.values_mut() {
                if matches(&query.cond, row)? {
                    *row = assign(row, values);
                    affected += 1;
                }
            }
            Ok(affected)
        })?;
        self.db
            .record(Operation::new(OpKind::UpdateWhere, &query.table, None));
        Ok(affected)
    }

    fn delete_where(&mut self, query: &TableQuery) -> Result<u64> {
        let affected = self.with_tables(|tables| {
            let Some(stored) = tables.get_mut(&query.table) else {
                return Ok(0);
            };
            let mut doomed = Vec::new();
            for (id, row) in &stored.rows {
                if matches(&query.cond, row)? {
                    doomed.push(*id);
                }
            }
            for id in &doomed {
                stored.rows.remove(id);
            }
            Ok(doomed.len() as u64)
        })?;
        self.db
            .record(Operation::new(OpKind::DeleteWhere, &query.table, None));
        Ok(affected)
    }

    fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(tx_error(
                TransactionErrorKind::AlreadyActive,
                "transaction already active",
            ));
        }
        self.tx = Some(self.db.snapshot());
        self.db.record(Operation::new(OpKind::Begin, "", None));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let tables = self
            .tx
            .take()
            .ok_or_else(|| tx_error(TransactionErrorKind::NotActive, "no active transaction"))?;
        self.db.publish(tables);
        self.db.record(Operation::new(OpKind::Commit, "", None));
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.tx.take().is_none() {
            return Err(tx_error(
                TransactionErrorKind::NotActive,
                "no active transaction",
            ));
        }
        self.db.record(Operation::new(OpKind::Rollback, "", None));
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    fn raw_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.db.record(Operation::new(OpKind::Raw, sql, None));
        let handler = self.db.raw_handler(sql).ok_or_else(|| {
            Error::Query(
                QueryError::new(
                    QueryErrorKind::Unsupported,
                    "no raw query fixture registered",
                )
                .with_statement(sql),
            )
        })?;
        Ok(handler(params))
    }
}
