//! Tenant identity and the per-session tenant context.
//!
//! Every query and write issued through a session is scoped by a
//! [`TenantContext`]. The context is an immutable value: changing the acting
//! tenant produces a new context rather than mutating a shared one.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::row::FromValue;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an isolation boundary (customer, organization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl TenantId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TenantId> for Value {
    fn from(t: TenantId) -> Self {
        Value::BigInt(t.0)
    }
}

impl FromValue for TenantId {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().map(TenantId).ok_or_else(|| {
            Error::Type(TypeError {
                expected: "TenantId",
                actual: value.type_name().to_string(),
                column: None,
                rust_type: Some("TenantId"),
            })
        })
    }
}

/// The tenant a session acts as, plus the policy switches around it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantContext {
    /// Acting tenant. `None` disables stamping and filtering.
    pub tenant: Option<TenantId>,
    /// Extra tenants whose entities the acting tenant may write.
    pub authorized_tenants: Vec<TenantId>,
    /// Skip the implicit `tenant = current` predicate on reads.
    pub ignore_tenant_filter: bool,
    /// Skip the write authorization check entirely.
    pub ignore_authorized_tenant_check: bool,
}

impl TenantContext {
    /// A context acting as `tenant`.
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant: Some(tenant),
            ..Self::default()
        }
    }

    /// A context without a tenant (no stamping, no filtering).
    pub fn unscoped() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: Option<TenantId>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn with_authorized_tenants(mut self, tenants: impl IntoIterator<Item = TenantId>) -> Self {
        self.authorized_tenants = tenants.into_iter().collect();
        self
    }

    pub fn with_ignore_tenant_filter(mut self, ignore: bool) -> Self {
        self.ignore_tenant_filter = ignore;
        self
    }

    pub fn with_ignore_authorized_tenant_check(mut self, ignore: bool) -> Self {
        self.ignore_authorized_tenant_check = ignore;
        self
    }

    /// The tenant to filter reads by, if filtering is active.
    pub fn filter_tenant(&self) -> Option<TenantId> {
        if self.ignore_tenant_filter {
            None
        } else {
            self.tenant
        }
    }

    /// Whether a tenant-scoped entity owned by `owner` may be written under
    /// this context.
    ///
    /// An entity without an owner only passes an unscoped context.
    pub fn authorizes(&self, owner: Option<TenantId>) -> bool {
        if self.ignore_authorized_tenant_check {
            return true;
        }
        match owner {
            None => self.tenant.is_none(),
            Some(owner) => self.tenant == Some(owner) || self.authorized_tenants.contains(&owner),
        }
    }
}
