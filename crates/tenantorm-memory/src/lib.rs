//! In-memory backend for tenantorm.
//!
//! `tenantorm-memory` stores rows in process memory and evaluates the same
//! [`Cond`](tenantorm_core::Cond) trees the criteria builder emits. It is
//! the reference backend for tests and examples:
//!
//! - [`MemoryDatabase`] - shared store, raw query fixtures and operation log
//! - [`MemoryConnection`] - a [`Connection`](tenantorm_core::Connection)
//!   with copy-on-begin transactions
//!
//! Every backend call is appended to the operation log so tests can assert
//! on ordering (for example that a cascade removes the parent first).

pub mod connection;
pub mod database;
pub mod filter;

pub use connection::MemoryConnection;
pub use database::{MemoryDatabase, OpKind, Operation};
pub use filter::{compare_rows, eval_lookup, matches};
