//! Composable, tenant-scoped criteria for tenantorm.
//!
//! `tenantorm-query` is the **query construction layer**. It turns predicate
//! declarations against a `Model` into backend [`TableQuery`](tenantorm_core::TableQuery)
//! values and runs them through a [`QuerySource`].
//!
//! # Role In The Architecture
//!
//! - **Criteria**: fluent predicates, OR/AND-OR/OR-AND groups, ordering and paging.
//! - **Translation**: field paths resolved through the capability table and
//!   rewritten into suffix lookups (`age__lte`, `name__icontains`).
//! - **Tenant scope**: the implicit `tenant = current` condition on every read
//!   and bulk mutation.
//! - **Raw queries**: an escape hatch for hand-written query text.
//!
//! Most users reach these builders through `Session::criteria` in the
//! `tenantorm` facade.

pub mod clause;
pub mod criteria;
pub mod page;
pub mod raw;
pub mod source;
pub mod translate;

pub use clause::{Clause, Where};
pub use criteria::{Criteria, Listing};
pub use page::Page;
pub use raw::RawQuery;
pub use source::{QuerySource, ScopedLoader, execute, load_association};
pub use translate::{resolve_column, tenant_filter, translate_predicate};
