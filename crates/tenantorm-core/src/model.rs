//! The entity contract.
//!
//! [`Entity`] is the object-safe view every persisted record offers to the
//! session and the graph walker. [`Model`] adds the static, typed half
//! (table constant, field table, row decoding) used by typed reads. Both
//! are normally derived with `#[derive(Model)]` from `tenantorm-macros`.

use crate::Result;
use crate::connection::TableQuery;
use crate::field::FieldInfo;
use crate::predicate::ConditionGroup;
use crate::relationship::AssociationMut;
use crate::row::Row;
use crate::tenant::TenantId;
use crate::value::Value;

/// Object-safe entity contract.
///
/// # Example
///
/// ```ignore
/// use tenantorm::prelude::*;
///
/// #[derive(Model, Default)]
/// #[model(table = "orders")]
/// struct Order {
///     #[model(primary_key)]
///     id: i64,
///     #[model(tenant)]
///     tenant_id: Option<TenantId>,
///     total: i64,
///     #[model(column = "customer_id", eager)]
///     customer: Related<Customer>,
/// }
/// ```
pub trait Entity: ModelEvents + Send + Sync + 'static {
    /// Rust type name, used to key recursion guards.
    fn type_name(&self) -> &'static str;

    fn table_name(&self) -> &'static str;

    /// The capability table for this entity's fields.
    fn field_infos(&self) -> &'static [FieldInfo];

    /// Identity value. Zero or negative means not yet stored.
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// True iff the identity value is a positive integer.
    fn is_persisted(&self) -> bool {
        self.id() > 0
    }

    /// Column values for a write, including the primary key and the
    /// reference column of every to-one association.
    fn to_row(&self) -> Row;

    /// Current value of the tenant field, if the entity has one.
    fn tenant(&self) -> Option<TenantId>;

    /// Write the tenant field. No-op for entities without one.
    fn set_tenant(&mut self, tenant: Option<TenantId>);

    /// Assign a single column from a backend value.
    ///
    /// Returns `false` when no field maps to `column`.
    fn set_column(&mut self, column: &str, value: &Value) -> Result<bool>;

    /// Mutable views of every association field, in declaration order.
    fn associations_mut(&mut self) -> Vec<AssociationMut<'_>>;
}

/// Typed half of the entity contract.
pub trait Model: Entity + Default + Sized {
    /// The name of the backend table.
    const TABLE_NAME: &'static str;

    /// The Rust type name.
    const TYPE_NAME: &'static str;

    /// Get field metadata for all fields.
    fn fields() -> &'static [FieldInfo];

    /// Construct a model instance from a backend row.
    fn from_row(row: &Row) -> Result<Self>;

    /// The primary key column.
    fn primary_key_column() -> &'static str {
        crate::field::primary_key(Self::fields()).map_or("id", |f| f.column)
    }
}

/// Lifecycle event hooks.
///
/// Every method has a no-op default. Instance hooks may fail, which aborts
/// the surrounding operation. Type-level hooks run while a criteria is
/// being built and executed.
///
/// # Example
///
/// ```ignore
/// impl ModelEvents for Invoice {
///     fn before_save(&mut self) -> Result<()> {
///         if self.number.is_empty() {
///             return Err(Error::Custom("invoice number required".into()));
///         }
///         Ok(())
///     }
///
///     fn before_criteria(group: &mut ConditionGroup) {
///         group.push(Predicate::is_null("deleted_at"));
///     }
/// }
/// ```
pub trait ModelEvents {
    /// Called before a new instance is inserted.
    fn before_save(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after an insert; the instance carries its generated id.
    fn after_save(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_remove(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_remove(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after a single instance has been loaded from a row.
    fn after_load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Adjust the plain-AND predicate group before translation.
    #[allow(unused_variables)]
    fn before_criteria(group: &mut ConditionGroup)
    where
        Self: Sized,
    {
    }

    /// Adjust the backend query right before execution.
    #[allow(unused_variables)]
    fn before_query(query: &mut TableQuery)
    where
        Self: Sized,
    {
    }

    /// Post-process a loaded list.
    #[allow(unused_variables)]
    fn after_list(items: &mut [Self])
    where
        Self: Sized,
    {
    }
}
