//! Change-tracking contract: entity states, identity keys, conflict reports.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::model::{EntityType, Model};
use crate::snapshot::Snapshot;
use crate::value::Value;

/// Persistence state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Tracked and matching its original values.
    Unchanged,
    /// New entity, needs INSERT on save.
    Added,
    /// Existing entity, needs UPDATE on save.
    Modified,
    /// Existing entity, needs DELETE on save.
    Deleted,
    /// Not tracked by the context.
    Detached,
}

impl EntityState {
    /// Whether saving an entity in this state writes to the store.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}

/// Unique key for an entity in a context's identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Type identifier for the Model type.
    type_id: TypeId,
    /// Hash of the primary key value(s).
    pk_hash: u64,
}

impl ObjectKey {
    /// Create an object key from a model instance.
    pub fn from_model<M: Model>(obj: &M) -> Self {
        Self::from_pk::<M>(&obj.primary_key_value())
    }

    /// Create an object key from type and primary key.
    pub fn from_pk<M: Model>(pk: &[Value]) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            pk_hash: hash_values(pk),
        }
    }

    /// Hash of the primary key values, also used by stores to key rows.
    #[must_use]
    pub fn pk_hash(&self) -> u64 {
        self.pk_hash
    }
}

/// Hash a slice of values for use as a primary key hash.
#[must_use]
pub fn hash_values(values: &[Value]) -> u64 {
    let mut hasher = DefaultHasher::new();
    values.len().hash(&mut hasher);
    for v in values {
        v.hash(&mut hasher);
    }
    hasher.finish()
}

/// One entity whose save was rejected because its stored row changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictEntry {
    /// Identity-map key of the conflicting entity.
    pub key: ObjectKey,
    /// Mapped type of the entity.
    pub entity: EntityType,
    /// Backing table.
    pub table: &'static str,
    /// Primary key values, for diagnostics.
    pub primary_key: Vec<Value>,
}

impl ConflictEntry {
    pub fn new<M: Model>(primary_key: Vec<Value>) -> Self {
        Self {
            key: ObjectKey::from_pk::<M>(&primary_key),
            entity: EntityType::of::<M>(),
            table: M::TABLE_NAME,
            primary_key,
        }
    }

    /// Primary key rendered for messages, e.g. `(1, 'a')`.
    #[must_use]
    pub fn display_key(&self) -> String {
        let parts: Vec<String> = self.primary_key.iter().map(ToString::to_string).collect();
        format!("({})", parts.join(", "))
    }
}

/// The set of entities a save attempt found in conflict, in detection order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConflictReport {
    entries: Vec<ConflictEntry>,
}

impl ConflictReport {
    #[must_use]
    pub fn new(entries: Vec<ConflictEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: ConflictEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries for entity type `E` only.
    #[must_use]
    pub fn of_type<E: 'static>(&self) -> ConflictReport {
        ConflictReport {
            entries: self
                .entries
                .iter()
                .filter(|e| e.entity.is::<E>())
                .cloned()
                .collect(),
        }
    }

    /// Distinct entity types in the report, in first-seen order.
    #[must_use]
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = Vec::new();
        for entry in &self.entries {
            if !types.contains(&entry.entity) {
                types.push(entry.entity);
            }
        }
        types
    }
}

impl<'a> IntoIterator for &'a ConflictReport {
    type Item = &'a ConflictEntry;
    type IntoIter = std::slice::Iter<'a, ConflictEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Capability interface over a change-tracking mapping context.
///
/// Implemented by the host runtime's adapter; the helper extension traits
/// are written purely against this interface.
pub trait ChangeTrackingContext {
    /// State of `entity`; `Detached` when the context does not track it.
    fn entry_state<M: Model>(&self, entity: &M) -> EntityState;

    /// Start tracking `entity` if needed, refresh its current values from it,
    /// and set its state.
    fn set_entry_state<M: Model>(&mut self, entity: &M, state: EntityState) -> Result<()>;

    /// Current ("proposed") values of a tracked entity.
    fn current_values(&self, key: &ObjectKey) -> Result<Snapshot>;

    /// Replace the current values of a tracked entity.
    fn set_current_values(&mut self, key: &ObjectKey, values: Snapshot) -> Result<()>;

    /// Check whether `set_current_values(key, values)` would be accepted,
    /// without applying it. Contexts that reject some snapshots override
    /// this with the same rules.
    fn validate_current_values(&self, key: &ObjectKey, values: &Snapshot) -> Result<()> {
        let _ = (key, values);
        Ok(())
    }

    /// Baseline values of a tracked entity; `None` for entities never stored.
    fn original_values(&self, key: &ObjectKey) -> Result<Option<Snapshot>>;

    /// Replace the baseline used by the next concurrency check.
    fn set_original_values(&mut self, key: &ObjectKey, values: Snapshot) -> Result<()>;

    /// Values presently stored for a tracked entity; `None` when the row no
    /// longer exists.
    fn database_values(&self, key: &ObjectKey) -> Result<Option<Snapshot>>;
}
