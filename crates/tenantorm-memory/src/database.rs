//! Shared in-memory store.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tenantorm_core::{Row, Value};

use crate::connection::MemoryConnection;

/// One stored table: rows keyed by primary key, in insertion order of ids.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub(crate) next_id: i64,
    pub(crate) rows: BTreeMap<i64, Row>,
}

impl Table {
    /// Reserve an id: the caller's positive id, or the next free one.
    pub(crate) fn allocate(&mut self, requested: i64) -> i64 {
        let id = if requested > 0 {
            requested
        } else {
            self.next_id + 1
        };
        self.next_id = self.next_id.max(id);
        id
    }
}

pub(crate) type Tables = BTreeMap<String, Table>;

type RawHandler = Arc<dyn Fn(&[Value]) -> Vec<Row> + Send + Sync>;

/// Kind of a logged backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Query,
    Count,
    Insert,
    Update,
    Delete,
    UpdateWhere,
    DeleteWhere,
    Begin,
    Commit,
    Rollback,
    Raw,
}

/// A backend call recorded in the operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    /// Table name, or the query text for raw queries.
    pub target: String,
    /// Row id for single-row writes.
    pub id: Option<i64>,
}

impl Operation {
    pub(crate) fn new(kind: OpKind, target: impl Into<String>, id: Option<i64>) -> Self {
        Self {
            kind,
            target: target.into(),
            id,
        }
    }
}

#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) tables: Tables,
    pub(crate) raw: HashMap<String, RawHandler>,
    pub(crate) log: Vec<Operation>,
}

/// A process-local database shared by every connection made from it.
///
/// Cloning is cheap and yields a handle to the same data.
///
/// # Example
///
/// ```ignore
/// let db = MemoryDatabase::new();
/// db.register_raw("select 1 as one", vec![Row::from_pairs([("one", Value::Int(1))])]);
/// let mut session = Session::new(db.connect(), TenantContext::new(TenantId(1)));
/// ```
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to this database.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection::new(self.clone())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record(&self, op: Operation) {
        tracing::trace!(kind = ?op.kind, target = %op.target, id = ?op.id, "memory op");
        self.lock().log.push(op);
    }

    /// Answer `sql` with fixed rows, whatever the parameters.
    pub fn register_raw(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.register_raw_fn(sql, move |_| rows.clone());
    }

    /// Answer `sql` by calling `handler` with the bound parameters.
    pub fn register_raw_fn(
        &self,
        sql: impl Into<String>,
        handler: impl Fn(&[Value]) -> Vec<Row> + Send + Sync + 'static,
    ) {
        self.lock().raw.insert(sql.into(), Arc::new(handler));
    }

    pub(crate) fn raw_handler(&self, sql: &str) -> Option<RawHandler> {
        self.lock().raw.get(sql).cloned()
    }

    /// Committed rows of `table`, ordered by id.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of committed rows in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Every operation issued so far, oldest first.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().log.clone()
    }

    /// Operations of one kind, oldest first.
    pub fn operations_of(&self, kind: OpKind) -> Vec<Operation> {
        self.lock()
            .log
            .iter()
            .filter(|op| op.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear_operations(&self) {
        self.lock().log.clear();
    }

    pub(crate) fn snapshot(&self) -> Tables {
        self.lock().tables.clone()
    }

    pub(crate) fn publish(&self, tables: Tables) {
        self.lock().tables = tables;
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("MemoryDatabase")
            .field("tables", &shared.tables.keys().collect::<Vec<_>>())
            .field("raw_queries", &shared.raw.len())
            .field("operations", &shared.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_increasing_ids() {
        let mut table = Table::default();
        assert_eq!(table.allocate(0), 1);
        assert_eq!(table.allocate(0), 2);
        assert_eq!(table.allocate(10), 10);
        assert_eq!(table.allocate(-1), 11);
        assert_eq!(table.allocate(5), 5);
        assert_eq!(table.allocate(0), 12);
    }

    #[test]
    fn clones_share_state() {
        let db = MemoryDatabase::new();
        let other = db.clone();
        db.record(Operation::new(OpKind::Begin, "", None));
        assert_eq!(other.operations().len(), 1);
        other.clear_operations();
        assert!(db.operations().is_empty());
    }
}
