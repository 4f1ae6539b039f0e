//! Core types and traits for tenantorm.
//!
//! This crate provides the foundations every other layer builds on:
//!
//! - [`Value`] and [`Row`] for data crossing the backend boundary
//! - [`Entity`]/[`Model`] and [`ModelEvents`] for the entity contract
//! - [`FieldInfo`]/[`FieldFlags`] for the per-field capability table
//! - [`Related`]/[`RelatedMany`] associations and the [`Association`] visitor
//! - [`Predicate`]/[`ConditionGroup`] for backend-agnostic filters
//! - [`Cond`]/[`TableQuery`]/[`Connection`] for the backend surface
//! - [`TenantId`]/[`TenantContext`] for tenant scoping

pub mod cond;
pub mod connection;
pub mod error;
pub mod field;
pub mod model;
pub mod predicate;
pub mod relationship;
pub mod row;
pub mod tenant;
pub mod value;

pub use cond::{Cond, Lookup};
pub use connection::{Connection, TableQuery};
pub use error::{
    AuthorizationError, ConfigError, Error, QueryError, QueryErrorKind, Result, TransactionError,
    TransactionErrorKind, TypeError,
};
pub use field::{FieldFlags, FieldInfo, FieldKind};
pub use model::{Entity, Model, ModelEvents};
pub use predicate::{ConditionGroup, MatchMode, Operator, OrderBy, Predicate, SortOrder};
pub use relationship::{Association, AssociationLoader, AssociationMut, Related, RelatedMany};
pub use row::{FromValue, Row};
pub use tenant::{TenantContext, TenantId};
pub use value::Value;
