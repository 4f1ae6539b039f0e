//! tenantorm - tenant-aware persistence sessions and composable criteria.
//!
//! tenantorm provides:
//!
//! - A derive macro that turns a struct into a model with a field capability table
//! - A composable criteria builder that never forgets the tenant filter
//! - A session that stamps and authorizes tenants on every write
//! - Depth-guarded graph walks: default-initialization, eager loading and
//!   cascading save/remove
//! - An in-memory backend for tests and examples
//!
//! # Quick Start
//!
//! ```ignore
//! use tenantorm::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! #[model(table = "projects")]
//! struct Project {
//!     #[model(primary_key)]
//!     id: i64,
//!     #[model(tenant)]
//!     tenant_id: Option<TenantId>,
//!     name: String,
//!     #[model(remote_column = "project_id", save_or_update_cascade, remove_cascade)]
//!     tasks: RelatedMany<Task>,
//! }
//!
//! #[derive(Model, Debug, Default)]
//! #[model(table = "tasks")]
//! struct Task {
//!     #[model(primary_key)]
//!     id: i64,
//!     project_id: i64,
//!     title: String,
//! }
//!
//! fn example() -> Result<()> {
//!     let db = MemoryDatabase::new();
//!     let mut session = Session::new(db.connect(), TenantContext::new(TenantId(7)));
//!
//!     session.transaction(|s| {
//!         let mut project = Project {
//!             name: "Launch".into(),
//!             tasks: vec![Task { title: "Write docs".into(), ..Default::default() }].into(),
//!             ..Default::default()
//!         };
//!         s.save_or_update_cascade(&mut project)?;
//!
//!         let recent = s
//!             .criteria::<Project>()
//!             .like("name", "lau", MatchMode::IContains)
//!             .order_desc("id")
//!             .set_limit(10)
//!             .list()?;
//!         assert_eq!(recent.len(), 1);
//!         Ok(())
//!     })
//! }
//! ```

pub use tenantorm_core::{
    Association, AssociationLoader, AssociationMut, AuthorizationError, Cond, ConditionGroup,
    ConfigError, Connection, Entity, Error, FieldFlags, FieldInfo, FieldKind, FromValue, Lookup,
    MatchMode, Model, ModelEvents, Operator, OrderBy, Predicate, QueryError, QueryErrorKind,
    Related, RelatedMany, Result, Row, SortOrder, TableQuery, TenantContext, TenantId,
    TransactionError, TransactionErrorKind, TypeError, Value,
};
pub use tenantorm_macros::Model;
pub use tenantorm_memory::{MemoryConnection, MemoryDatabase, OpKind, Operation};
pub use tenantorm_query::{
    Clause, Criteria, Listing, Page, QuerySource, RawQuery, ScopedLoader, Where,
};
pub use tenantorm_session::{
    DEFAULT_MAX_EDGE_VISITS, Session, SessionConfig, SessionState, Traversal,
};

/// Sub-crates, for items not re-exported at the root.
pub mod query {
    pub use tenantorm_query::*;
}

pub mod session {
    pub use tenantorm_session::*;
}

pub mod memory {
    pub use tenantorm_memory::*;
}

/// The usual imports for application code.
pub mod prelude {
    pub use crate::{
        ConditionGroup, Connection, Criteria, Entity, Error, FieldFlags, Listing, MatchMode,
        MemoryDatabase, Model, ModelEvents, OrderBy, Page, Predicate, Related, RelatedMany,
        Result, Row, Session, SessionConfig, SortOrder, TenantContext, TenantId, Value,
    };
}
