//! The `Model` trait and runtime type handles.

use std::any::TypeId;
use std::fmt;

use crate::error::Result;
use crate::field::FieldInfo;
use crate::snapshot::Snapshot;
use crate::value::Value;

/// A type mapped onto a database table.
///
/// # Example
///
/// ```
/// use entitykit_core::{FieldInfo, Model, Result, Snapshot, SqlType};
///
/// struct Hero {
///     id: i64,
///     name: String,
/// }
///
/// static HERO_FIELDS: &[FieldInfo] = &[
///     FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
///     FieldInfo::new("name", "name", SqlType::Text),
/// ];
///
/// impl Model for Hero {
///     const TABLE_NAME: &'static str = "heroes";
///     const PRIMARY_KEY: &'static [&'static str] = &["id"];
///
///     fn fields() -> &'static [FieldInfo] {
///         HERO_FIELDS
///     }
///
///     fn to_snapshot(&self) -> Snapshot {
///         Snapshot::new().with("id", self.id).with("name", self.name.as_str())
///     }
///
///     fn from_snapshot(values: &Snapshot) -> Result<Self> {
///         Ok(Self {
///             id: values.decode("id")?,
///             name: values.decode("name")?,
///         })
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// Backing table name.
    const TABLE_NAME: &'static str;
    /// Backing table schema, if any.
    const SCHEMA: Option<&'static str> = None;
    /// Names of the primary key fields.
    const PRIMARY_KEY: &'static [&'static str];

    /// Mapped fields, in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Current field values, in `fields()` order.
    fn to_snapshot(&self) -> Snapshot;

    /// Rebuild an instance from a snapshot.
    fn from_snapshot(values: &Snapshot) -> Result<Self>;

    /// Primary key values, in `PRIMARY_KEY` order.
    fn primary_key_value(&self) -> Vec<Value> {
        let snapshot = self.to_snapshot();
        Self::PRIMARY_KEY
            .iter()
            .map(|pk| snapshot.get(pk).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// Runtime handle for a mapped type.
#[derive(Clone, Copy)]
pub struct EntityType {
    type_id: TypeId,
    name: &'static str,
}

impl EntityType {
    /// Handle for `M`.
    #[must_use]
    pub fn of<M: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// Whether this handle refers to `M`.
    #[must_use]
    pub fn is<M: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<M>()
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityType {}

impl std::hash::Hash for EntityType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityType").field(&self.name).finish()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
