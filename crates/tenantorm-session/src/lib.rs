//! Tenant-aware sessions for tenantorm.
//!
//! `tenantorm-session` is the **unit-of-work layer**. A [`Session`] is the only
//! way business code reaches the backend: it owns the connection and its
//! transaction, scopes every read to the current tenant and checks every write
//! against the tenant authorization policy.
//!
//! # Role In The Architecture
//!
//! - **Transactions**: `open` begins, `close` commits or rolls back depending on
//!   whether a backend failure was recorded; [`Session::transaction`] owns the
//!   whole boundary in one call.
//! - **Tenant scope**: reads get the implicit tenant filter from
//!   `tenantorm-query`; writes stamp an unset tenant field and are authorized
//!   before they reach the backend.
//! - **Graph walker**: default-initialization, eager loading and cascading
//!   save/remove over association fields, see [`walker`].
//!
//! # Example
//!
//! ```ignore
//! let db = MemoryDatabase::new();
//! let mut session = Session::new(db.connect(), TenantContext::new(TenantId(1)));
//!
//! let mut ticket = Ticket { title: "Broken login".into(), ..Default::default() };
//! session.save(&mut ticket)?;            // stamped with tenant 1
//!
//! let open = session
//!     .criteria::<Ticket>()
//!     .eq("status", "open")
//!     .order_desc("id")
//!     .list()?;
//!
//! session.close()?;                      // commit
//! ```

pub mod walker;

pub use walker::{DEFAULT_MAX_EDGE_VISITS, Traversal, eager, eager_force, set_defaults};

use serde::{Deserialize, Serialize};
use tenantorm_core::field::{primary_key, tenant_field};
use tenantorm_core::{
    AuthorizationError, Cond, ConfigError, Connection, Entity, Error, FieldInfo, Lookup, Model,
    QueryError, QueryErrorKind, Result, TenantContext, TenantId, Value,
};
use tenantorm_query::{Criteria, Listing, Page, QuerySource, RawQuery, load_association};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether `open` begins a transaction or uses a bare connection.
    pub transactional: bool,
    /// Whether the first operation opens the session lazily.
    pub auto_begin: bool,
    /// Disable the implicit tenant filter on reads.
    pub ignore_tenant_filter: bool,
    /// Disable the tenant authorization check on writes.
    pub ignore_authorized_tenant_check: bool,
    /// Authorize every node of a cascade, not only the root.
    pub validate_cascade_children: bool,
    /// How many times a traversal may cross one `(type, field)` edge.
    pub max_edge_visits: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transactional: true,
            auto_begin: true,
            ignore_tenant_filter: false,
            ignore_authorized_tenant_check: false,
            validate_cascade_children: false,
            max_edge_visits: DEFAULT_MAX_EDGE_VISITS,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid session configuration: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }
}

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection work has happened yet.
    Created,
    /// Open and healthy; `close` commits.
    Open,
    /// A backend call failed; `close` rolls back.
    Failed,
    /// Closed; the session can no longer be used.
    Closed,
}

// ============================================================================
// Session
// ============================================================================

/// A single-owner unit of work bound to one tenant context.
///
/// A session is not meant to be shared: each request or job builds its own.
pub struct Session<C: Connection> {
    connection: C,
    context: TenantContext,
    config: SessionConfig,
    state: SessionState,
}

fn pk_column(fields: &[FieldInfo]) -> &'static str {
    primary_key(fields).map_or("id", |f| f.column)
}

fn pk_field<M: Model>() -> &'static str {
    primary_key(M::fields()).map_or("id", |f| f.name)
}

impl<C: Connection> Session<C> {
    /// Create a session with the default configuration.
    pub fn new(connection: C, context: TenantContext) -> Self {
        Self::with_config(connection, context, SessionConfig::default())
    }

    /// Create a session with custom configuration.
    ///
    /// The configuration's `ignore_*` switches are folded into the context.
    pub fn with_config(connection: C, context: TenantContext, config: SessionConfig) -> Self {
        let context = TenantContext {
            ignore_tenant_filter: context.ignore_tenant_filter || config.ignore_tenant_filter,
            ignore_authorized_tenant_check: context.ignore_authorized_tenant_check
                || config.ignore_authorized_tenant_check,
            ..context
        };
        Self {
            connection,
            context,
            config,
            state: SessionState::Created,
        }
    }

    /// The backend connection.
    pub fn backend(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The tenant currently in effect.
    pub fn tenant(&self) -> Option<TenantId> {
        self.context.tenant
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the session, beginning a transaction if configured to.
    pub fn open(&mut self) -> Result<()> {
        self.open_with(self.config.transactional)
    }

    /// Open the session with an explicit transaction choice.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn open_with(&mut self, transactional: bool) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Failed => Ok(()),
            SessionState::Closed => Err(Error::config("session is closed")),
            SessionState::Created => {
                if transactional {
                    self.connection.begin()?;
                }
                self.state = SessionState::Open;
                tracing::debug!(transactional, tenant = ?self.context.tenant, "Session opened");
                Ok(())
            }
        }
    }

    /// Close the session: commit when healthy, roll back after a failure.
    ///
    /// Closing is terminal; a failed commit is rolled back and returned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn close(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        if !self.connection.in_transaction() {
            tracing::debug!(?state, "Session closed");
            return Ok(());
        }
        match state {
            SessionState::Open => {
                if let Err(e) = self.connection.commit() {
                    tracing::warn!(error = %e, "Commit failed, rolling back");
                    if let Err(rollback) = self.connection.rollback() {
                        tracing::warn!(error = %rollback, "Rollback after failed commit failed");
                    }
                    return Err(e);
                }
                tracing::debug!("Session committed");
            }
            SessionState::Failed => {
                self.connection.rollback()?;
                tracing::debug!("Session rolled back");
            }
            SessionState::Created | SessionState::Closed => {}
        }
        Ok(())
    }

    /// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.open_with(true)?;
        let result = f(self);
        if result.is_err() && self.state == SessionState::Open {
            self.state = SessionState::Failed;
        }
        let closed = self.close();
        match result {
            Ok(value) => closed.map(|()| value),
            Err(e) => {
                if let Err(close_error) = closed {
                    tracing::warn!(error = %close_error, "Closing failed transaction failed");
                }
                Err(e)
            }
        }
    }

    fn ensure_open(&mut self) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Failed => Ok(()),
            SessionState::Closed => Err(Error::config("session is closed")),
            SessionState::Created if self.config.auto_begin => self.open(),
            SessionState::Created => Err(Error::config("session is not open")),
        }
    }

    fn live(&mut self) -> Result<&mut C> {
        self.ensure_open()?;
        Ok(&mut self.connection)
    }

    fn fail(&mut self, error: &Error) {
        if error.is_config() || error.is_authorization() {
            return;
        }
        if self.state == SessionState::Open {
            tracing::warn!(error = %error, "Session marked failed");
            self.state = SessionState::Failed;
        }
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    // ========================================================================
    // Tenant Scope
    // ========================================================================

    /// Run `f` with `context` in effect, restoring the previous context after.
    pub fn run_with_context<T>(
        &mut self,
        context: TenantContext,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.context, context);
        let result = f(self);
        self.context = previous;
        result
    }

    /// Run `f` acting as `tenant`, restoring the previous tenant after.
    pub fn run_with_tenant<T>(
        &mut self,
        tenant: TenantId,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        tracing::debug!(from = ?self.context.tenant, to = %tenant, "Running with tenant");
        let context = self.context.clone().with_tenant(Some(tenant));
        self.run_with_context(context, f)
    }

    fn stamp(&self, entity: &mut dyn Entity) {
        if entity.tenant().is_some() || !entity.field_infos().iter().any(|f| f.stamps_tenant()) {
            return;
        }
        if let Some(tenant) = self.context.tenant {
            tracing::debug!(table = entity.table_name(), %tenant, "Stamping tenant");
            entity.set_tenant(Some(tenant));
        }
    }

    /// Check the write policy. Models without a tenant field always pass.
    fn authorize(&self, entity: &dyn Entity, operation: &'static str) -> Result<()> {
        let owner = entity.tenant();
        if tenant_field(entity.field_infos()).is_none() || self.context.authorizes(owner) {
            return Ok(());
        }
        tracing::warn!(
            table = entity.table_name(),
            operation,
            entity_tenant = ?owner,
            session_tenant = ?self.context.tenant,
            "Tenant authorization denied"
        );
        Err(Error::Unauthorized(AuthorizationError {
            table: entity.table_name(),
            operation,
            entity_tenant: owner,
            session_tenant: self.context.tenant,
        }))
    }

    /// Restrict a single-row write to the stored row of the owning tenant.
    ///
    /// The owner is the entity's tenant, or the acting tenant for an entity
    /// that carries none. A stored row of any other tenant is left untouched.
    fn write_scope(&self, entity: &dyn Entity) -> Cond {
        if self.context.ignore_authorized_tenant_check {
            return Cond::default();
        }
        let owner = entity.tenant().or(self.context.tenant);
        match (tenant_field(entity.field_infos()), owner) {
            (Some(field), Some(owner)) => Cond::filter(Lookup::Exact.apply(field.column), owner),
            _ => Cond::default(),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a new entity and store its generated id.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(table = entity.table_name()))]
    pub fn save(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.save_entity(entity, true)
    }

    /// Write a persisted entity back. A missing row is a constraint error.
    #[tracing::instrument(
        level = "debug",
        skip(self, entity),
        fields(table = entity.table_name(), id = entity.id())
    )]
    pub fn update(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.update_entity(entity, true)
    }

    /// Save or update depending on whether the entity is persisted.
    pub fn save_or_update(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.persist(entity, true)
    }

    /// Delete a persisted entity.
    #[tracing::instrument(
        level = "debug",
        skip(self, entity),
        fields(table = entity.table_name(), id = entity.id())
    )]
    pub fn remove(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.erase(entity, true)
    }

    pub(crate) fn persist(&mut self, entity: &mut dyn Entity, authorize: bool) -> Result<()> {
        if entity.is_persisted() {
            self.update_entity(entity, authorize)
        } else {
            self.save_entity(entity, authorize)
        }
    }

    fn save_entity(&mut self, entity: &mut dyn Entity, authorize: bool) -> Result<()> {
        self.stamp(entity);
        if authorize {
            self.authorize(entity, "save")?;
        }
        let result = self.insert_row(entity);
        self.settle(result)
    }

    fn insert_row(&mut self, entity: &mut dyn Entity) -> Result<()> {
        entity.before_save()?;
        let table = entity.table_name();
        let pk = pk_column(entity.field_infos());
        let row = entity.to_row();
        let id = self.live()?.insert(table, pk, &row)?;
        entity.set_id(id);
        tracing::debug!(table, id, "Saved entity");
        entity.after_save()
    }

    fn update_entity(&mut self, entity: &mut dyn Entity, authorize: bool) -> Result<()> {
        if !entity.is_persisted() {
            return Err(Error::config(format!(
                "cannot update unsaved {}",
                entity.type_name()
            )));
        }
        self.stamp(entity);
        if authorize {
            self.authorize(entity, "update")?;
        }
        let result = self.update_row(entity);
        self.settle(result)
    }

    fn update_row(&mut self, entity: &mut dyn Entity) -> Result<()> {
        entity.before_update()?;
        let table = entity.table_name();
        let pk = pk_column(entity.field_infos());
        let id = entity.id();
        let row = entity.to_row();
        let scope = self.write_scope(entity);
        let affected = self.live()?.update(table, pk, id, &scope, &row)?;
        if affected == 0 {
            return Err(Error::Query(
                QueryError::new(
                    QueryErrorKind::Constraint,
                    format!("no {table} row with {pk} = {id} to update"),
                )
                .with_table(table),
            ));
        }
        tracing::debug!(table, id, "Updated entity");
        entity.after_update()
    }

    pub(crate) fn erase(&mut self, entity: &mut dyn Entity, authorize: bool) -> Result<()> {
        if !entity.is_persisted() {
            return Err(Error::config(format!(
                "cannot remove unsaved {}",
                entity.type_name()
            )));
        }
        if authorize {
            self.authorize(entity, "remove")?;
        }
        let result = self.delete_row(entity);
        self.settle(result)
    }

    fn delete_row(&mut self, entity: &mut dyn Entity) -> Result<()> {
        entity.before_remove()?;
        let table = entity.table_name();
        let pk = pk_column(entity.field_infos());
        let id = entity.id();
        let scope = self.write_scope(entity);
        let affected = self.live()?.delete(table, pk, id, &scope)?;
        tracing::debug!(table, id, affected, "Removed entity");
        entity.after_remove()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Start a tenant-scoped criteria over `M`.
    pub fn criteria<M: Model>(&mut self) -> Criteria<'_, M> {
        Criteria::new(self)
    }

    /// Load one entity by id. Absent (or another tenant's) rows yield `None`.
    pub fn get<M: Model>(&mut self, id: i64) -> Result<Option<M>> {
        self.criteria::<M>().eq(pk_field::<M>(), id).one()
    }

    /// Alias of [`Session::get`].
    pub fn find_by_id<M: Model>(&mut self, id: i64) -> Result<Option<M>> {
        self.get(id)
    }

    /// Every entity whose field `path` equals `value`.
    pub fn find_by<M: Model>(&mut self, path: &str, value: impl Into<Value>) -> Result<Vec<M>> {
        self.criteria::<M>().eq(path, value).list()
    }

    /// Every visible entity of `M`.
    pub fn list<M: Model>(&mut self) -> Result<Vec<M>> {
        self.criteria::<M>().list()
    }

    /// One page of `M` plus the unpaged total.
    pub fn page<M: Model>(&mut self, page: &Page) -> Result<Listing<M>> {
        self.criteria::<M>().set_page(page).list_and_count()
    }

    pub fn count<M: Model>(&mut self) -> Result<u64> {
        self.criteria::<M>().count()
    }

    /// Whether an entity with this id is visible.
    pub fn exists<M: Model>(&mut self, id: i64) -> Result<bool> {
        self.criteria::<M>().eq(pk_field::<M>(), id).exists()
    }

    /// Load one association of `entity` by field name.
    pub fn load_related(&mut self, entity: &mut dyn Entity, field: &str) -> Result<bool> {
        load_association(self, entity, field)
    }

    /// A hand-written query. No tenant filter is applied.
    pub fn raw(
        &mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = Value>,
    ) -> RawQuery<'_> {
        RawQuery::new(self, sql).bind_all(params)
    }
}

impl<C: Connection> QuerySource for Session<C> {
    fn context(&self) -> &TenantContext {
        &self.context
    }

    fn connection(&mut self) -> Result<&mut dyn Connection> {
        let connection: &mut dyn Connection = self.live()?;
        Ok(connection)
    }

    fn record_failure(&mut self, error: &Error) {
        self.fail(error);
    }
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("in_transaction", &self.connection.in_transaction())
            .finish_non_exhaustive()
    }
}
