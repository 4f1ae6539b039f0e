//! Association fields and the visitor the graph walker uses to reach them.
//!
//! - [`Related<T>`]: a to-one association. Its zero value is empty. A value
//!   decoded from a row is a *reference*: a `T::default()` carrying only the
//!   referenced id, which eager loading later replaces with the full row.
//! - [`RelatedMany<T>`]: a to-many association loaded through a
//!   back-reference column on the child table.
//!
//! Both implement the object-safe [`Association`] trait so traversals can
//! walk an entity graph without knowing concrete types.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::field::FieldInfo;
use crate::model::{Entity, Model};
use crate::row::{FromValue, Row};
use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Backend access needed to resolve associations.
///
/// Implemented by the session, which applies the implicit tenant filter to
/// every load.
pub trait AssociationLoader {
    /// Load the row of `table` whose primary key is `id`.
    fn load_by_id(
        &mut self,
        table: &'static str,
        fields: &'static [FieldInfo],
        id: i64,
    ) -> Result<Option<Row>>;

    /// Load every row of `table` whose `column` equals `owner_id`.
    fn load_by_column(
        &mut self,
        table: &'static str,
        fields: &'static [FieldInfo],
        column: &str,
        owner_id: i64,
    ) -> Result<Vec<Row>>;
}

/// Object-safe view of an association field.
pub trait Association: Send + Sync {
    fn target_type(&self) -> &'static str;

    fn target_table(&self) -> &'static str;

    /// Whether the field holds a non-zero value.
    fn is_set(&self) -> bool;

    /// Id of a persisted to-one reference.
    fn reference_id(&self) -> Option<i64>;

    /// Allocate a zero-valued target if the field is unset.
    ///
    /// Returns `true` when something was allocated.
    fn set_default(&mut self) -> bool;

    /// The entities currently held by the field.
    fn entities_mut(&mut self) -> Vec<&mut dyn Entity>;

    /// Replace the field's content with backend state.
    ///
    /// Returns `false` when there was nothing to load or nothing was found.
    fn load(
        &mut self,
        loader: &mut dyn AssociationLoader,
        owner_id: i64,
        remote_column: Option<&'static str>,
    ) -> Result<bool>;
}

/// An association field of some entity, paired with its metadata.
pub struct AssociationMut<'a> {
    pub field: &'static FieldInfo,
    pub association: &'a mut dyn Association,
}

impl<'a> AssociationMut<'a> {
    pub fn new(field: &'static FieldInfo, association: &'a mut dyn Association) -> Self {
        Self { field, association }
    }
}

impl fmt::Debug for AssociationMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationMut")
            .field("field", &self.field.name)
            .field("target", &self.association.target_type())
            .field("set", &self.association.is_set())
            .finish()
    }
}

/// A to-one association.
#[derive(Clone, PartialEq)]
pub struct Related<T> {
    value: Option<Box<T>>,
}

impl<T> Related<T> {
    /// An empty association.
    #[must_use]
    pub const fn empty() -> Self {
        Self { value: None }
    }

    /// An association holding `obj`.
    #[must_use]
    pub fn new(obj: T) -> Self {
        Self {
            value: Some(Box::new(obj)),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_deref_mut()
    }

    pub fn set(&mut self, obj: T) {
        self.value = Some(Box::new(obj));
    }

    pub fn take(&mut self) -> Option<T> {
        self.value.take().map(|b| *b)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

impl<T: Model> Related<T> {
    /// A reference to the stored entity with the given id.
    #[must_use]
    pub fn reference(id: i64) -> Self {
        let mut obj = T::default();
        obj.set_id(id);
        Self::new(obj)
    }

    /// Id of the held entity, if it has been stored.
    pub fn id(&self) -> Option<i64> {
        self.get().filter(|t| t.is_persisted()).map(|t| t.id())
    }

    /// The reference column value written for this association.
    pub fn to_value(&self) -> Value {
        self.id().map_or(Value::Null, Value::BigInt)
    }
}

impl<T> Default for Related<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for Related<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => f.debug_tuple("Related").field(v).finish(),
            None => f.write_str("Related(empty)"),
        }
    }
}

impl<T: Model> FromValue for Related<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::empty()),
            other => {
                let id = other.as_i64().ok_or_else(|| {
                    Error::Type(TypeError {
                        expected: "reference id",
                        actual: other.type_name().to_string(),
                        column: None,
                        rust_type: Some(T::TYPE_NAME),
                    })
                })?;
                Ok(if id > 0 {
                    Self::reference(id)
                } else {
                    Self::empty()
                })
            }
        }
    }
}

impl<T: Model> Association for Related<T> {
    fn target_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn target_table(&self) -> &'static str {
        T::TABLE_NAME
    }

    fn is_set(&self) -> bool {
        self.value.is_some()
    }

    fn reference_id(&self) -> Option<i64> {
        self.id()
    }

    fn set_default(&mut self) -> bool {
        if self.value.is_some() {
            return false;
        }
        self.value = Some(Box::default());
        true
    }

    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        match self.value.as_deref_mut() {
            Some(obj) => vec![obj as &mut dyn Entity],
            None => Vec::new(),
        }
    }

    fn load(
        &mut self,
        loader: &mut dyn AssociationLoader,
        _owner_id: i64,
        _remote_column: Option<&'static str>,
    ) -> Result<bool> {
        let Some(id) = self.id() else {
            return Ok(false);
        };
        let Some(row) = loader.load_by_id(T::TABLE_NAME, T::fields(), id)? else {
            return Ok(false);
        };
        let mut obj = T::from_row(&row)?;
        obj.after_load()?;
        self.set(obj);
        Ok(true)
    }
}

impl<T: Serialize> Serialize for Related<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.value.as_deref().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Related<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            value: Option::<T>::deserialize(deserializer)?.map(Box::new),
        })
    }
}

/// A to-many association.
#[derive(Clone, PartialEq)]
pub struct RelatedMany<T> {
    items: Vec<T>,
}

impl<T> RelatedMany<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for RelatedMany<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for RelatedMany<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for RelatedMany<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a RelatedMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for RelatedMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: Model> Association for RelatedMany<T> {
    fn target_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn target_table(&self) -> &'static str {
        T::TABLE_NAME
    }

    fn is_set(&self) -> bool {
        !self.items.is_empty()
    }

    fn reference_id(&self) -> Option<i64> {
        None
    }

    fn set_default(&mut self) -> bool {
        false
    }

    fn entities_mut(&mut self) -> Vec<&mut dyn Entity> {
        self.items
            .iter_mut()
            .map(|item| item as &mut dyn Entity)
            .collect()
    }

    fn load(
        &mut self,
        loader: &mut dyn AssociationLoader,
        owner_id: i64,
        remote_column: Option<&'static str>,
    ) -> Result<bool> {
        let Some(column) = remote_column else {
            return Err(Error::config(format!(
                "to-many association of {} has no remote column",
                T::TYPE_NAME
            )));
        };
        if owner_id <= 0 {
            return Ok(false);
        }
        let rows = loader.load_by_column(T::TABLE_NAME, T::fields(), column, owner_id)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut obj = T::from_row(row)?;
            obj.after_load()?;
            items.push(obj);
        }
        self.items = items;
        Ok(true)
    }
}

impl<T: Serialize> Serialize for RelatedMany<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for RelatedMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self {
            items: Vec::<T>::deserialize(deserializer)?,
        })
    }
}
