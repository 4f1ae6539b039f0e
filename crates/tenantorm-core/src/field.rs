//! Field metadata: the per-model capability table.
//!
//! Every model exposes a static slice of [`FieldInfo`] describing its
//! columns and associations. Behaviour that depends on field annotations
//! (tenant stamping, tenant filtering, eager loading, default
//! initialization, cascades) reads the [`FieldFlags`] recorded here.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// What a field maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain column.
    Column,
    /// A to-one association stored as a reference column.
    ToOne,
    /// A to-many association loaded through a back-reference column.
    ToMany,
}

impl FieldKind {
    pub const fn is_association(self) -> bool {
        matches!(self, FieldKind::ToOne | FieldKind::ToMany)
    }
}

/// Annotation flags attached to a field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldFlags(u16);

impl FieldFlags {
    pub const NONE: Self = Self(0);
    pub const PRIMARY_KEY: Self = Self(1);
    /// Tenant-association field: stamped on write, filtered on read.
    pub const TENANT: Self = Self(1 << 1);
    pub const NO_SET_TENANT: Self = Self(1 << 2);
    pub const NO_FILTER_TENANT: Self = Self(1 << 3);
    pub const EAGER: Self = Self(1 << 4);
    pub const IGNORE_EAGER: Self = Self(1 << 5);
    pub const IGNORE_EAGER_CHILD: Self = Self(1 << 6);
    pub const IGNORE_SET_DEFAULT: Self = Self(1 << 7);
    pub const IGNORE_SET_DEFAULT_CHILD: Self = Self(1 << 8);
    pub const SAVE_OR_UPDATE_CASCADE: Self = Self(1 << 9);
    pub const REMOVE_CASCADE: Self = Self(1 << 10);

    const NAMES: [(Self, &'static str); 11] = [
        (Self::PRIMARY_KEY, "primary_key"),
        (Self::TENANT, "tenant"),
        (Self::NO_SET_TENANT, "no_set_tenant"),
        (Self::NO_FILTER_TENANT, "no_filter_tenant"),
        (Self::EAGER, "eager"),
        (Self::IGNORE_EAGER, "ignore_eager"),
        (Self::IGNORE_EAGER_CHILD, "ignore_eager_child"),
        (Self::IGNORE_SET_DEFAULT, "ignore_set_default"),
        (Self::IGNORE_SET_DEFAULT_CHILD, "ignore_set_default_child"),
        (Self::SAVE_OR_UPDATE_CASCADE, "save_or_update_cascade"),
        (Self::REMOVE_CASCADE, "remove_cascade"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Union of two flag sets, usable in const context.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Look up a flag by its annotation name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(flag, _)| *flag)
    }

    /// Annotation names of the flags that are set, in declaration order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for FieldFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for FieldFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Metadata about a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Backend column name. For to-one associations this is the reference
    /// column; to-many associations have no column of their own.
    pub column: &'static str,
    pub kind: FieldKind,
    pub flags: FieldFlags,
    /// Column on the child table holding the owner's id (to-many only).
    pub remote_column: Option<&'static str>,
}

impl FieldInfo {
    /// A plain column whose name matches the field.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column: name,
            kind: FieldKind::Column,
            flags: FieldFlags::NONE,
            remote_column: None,
        }
    }

    /// Set the backend column name.
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    pub const fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add annotation flags.
    pub const fn flags(mut self, flags: FieldFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    pub const fn remote_column(mut self, column: &'static str) -> Self {
        self.remote_column = Some(column);
        self
    }

    pub const fn has(&self, flag: FieldFlags) -> bool {
        self.flags.contains(flag)
    }

    pub const fn is_primary_key(&self) -> bool {
        self.has(FieldFlags::PRIMARY_KEY)
    }

    pub const fn is_association(&self) -> bool {
        self.kind.is_association()
    }

    /// Whether the field may be queried directly by column.
    pub const fn is_queryable(&self) -> bool {
        !matches!(self.kind, FieldKind::ToMany)
    }

    /// Tenant field that should be stamped on save/update.
    pub const fn stamps_tenant(&self) -> bool {
        self.has(FieldFlags::TENANT) && !self.has(FieldFlags::NO_SET_TENANT)
    }

    /// Tenant field that should restrict reads.
    pub const fn filters_tenant(&self) -> bool {
        self.has(FieldFlags::TENANT) && !self.has(FieldFlags::NO_FILTER_TENANT)
    }
}

/// Find a field by Rust name or column name.
pub fn find_field<'a>(fields: &'a [FieldInfo], path: &str) -> Option<&'a FieldInfo> {
    fields
        .iter()
        .find(|f| f.name == path)
        .or_else(|| fields.iter().find(|f| f.column == path && f.is_queryable()))
}

/// The model's primary key field.
pub fn primary_key(fields: &[FieldInfo]) -> Option<&FieldInfo> {
    fields.iter().find(|f| f.is_primary_key())
}

/// The model's tenant field, whatever its stamping and filtering flags.
pub fn tenant_field(fields: &[FieldInfo]) -> Option<&FieldInfo> {
    fields.iter().find(|f| f.has(FieldFlags::TENANT))
}

/// The first tenant field eligible for read filtering.
pub fn tenant_filter_field(fields: &[FieldInfo]) -> Option<&FieldInfo> {
    fields.iter().find(|f| f.filters_tenant())
}
