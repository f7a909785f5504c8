//! In-memory unit of work for EntityKit.
//!
//! The Session tracks entities against a [`Store`], records their current and
//! original values, and writes pending changes on `save_changes()`. It is the
//! reference host for the `ChangeTrackingContext` and
//! `MappingMetadataProvider` capability traits.
//!
//! # Design Philosophy
//!
//! - **Explicit over implicit**: nothing is written until `save_changes()`
//! - **Ownership clarity**: Session owns the store
//! - **Optimistic concurrency**: a save compares each baseline with the
//!   stored row and refuses to write anything if any of them moved
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(MemoryStore::new());
//!
//! // Load (uses identity map)
//! let mut hero = session.get::<Hero>(1)?.unwrap();
//!
//! // Change and mark for UPDATE
//! hero.name = "Deadpond".into();
//! session.update(&hero)?;
//!
//! // Write pending changes; a moved row yields Error::Concurrency
//! session.save_changes()?;
//! ```

mod store;

pub use store::{MemoryStore, Store};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use entitykit_core::{
    ChangeTrackingContext, ConflictEntry, ConflictReport, EntityState, EntityType, Error,
    MappingMetadataProvider, Model, ModelRegistry, ObjectKey, Result, Snapshot, TableDescriptor,
    Value,
};

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
///
/// Missing keys take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether `save_changes()` checks baselines against stored rows.
    pub detect_conflicts: bool,
    /// Whether tracking an unregistered model registers it on the fly.
    pub auto_register: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detect_conflicts: true,
            auto_register: true,
        }
    }
}

/// A tracked entity in the session.
struct TrackedObject {
    entity: EntityType,
    table_name: &'static str,
    /// Primary key field names.
    pk_fields: &'static [&'static str],
    /// Primary key values the entity was tracked under.
    primary_key: Vec<Value>,
    /// Fields compared against the stored row on save.
    concurrency_fields: Vec<&'static str>,
    /// Current ("proposed") values.
    current: Snapshot,
    /// Baseline values; `None` for entities that were never stored.
    original: Option<Snapshot>,
    state: EntityState,
}

impl TrackedObject {
    fn new<M: Model>(obj: &M, state: EntityState) -> Self {
        let current = obj.to_snapshot();
        let fields = M::fields();
        let tokens: Vec<&'static str> = fields
            .iter()
            .filter(|f| f.concurrency_token)
            .map(|f| f.name)
            .collect();
        let concurrency_fields = if tokens.is_empty() {
            fields.iter().map(|f| f.name).collect()
        } else {
            tokens
        };

        let original = if state == EntityState::Added {
            None
        } else {
            Some(current.clone())
        };

        Self {
            entity: EntityType::of::<M>(),
            table_name: M::TABLE_NAME,
            pk_fields: M::PRIMARY_KEY,
            primary_key: obj.primary_key_value(),
            concurrency_fields,
            current,
            original,
            state,
        }
    }

    fn entry(&self, key: ObjectKey) -> ConflictEntry {
        ConflictEntry {
            key,
            entity: self.entity,
            table: self.table_name,
            primary_key: self.primary_key.clone(),
        }
    }

    /// Whether the stored row still matches the baseline.
    fn matches_stored(&self, stored: &Snapshot) -> bool {
        let Some(original) = &self.original else {
            return true;
        };
        self.concurrency_fields
            .iter()
            .all(|f| original.get(f) == stored.get(f))
    }
}

// ============================================================================
// Session
// ============================================================================

/// The Session is the unit-of-work manager over a [`Store`].
pub struct Session<S: Store> {
    /// The backing store.
    store: S,
    /// Mapping metadata for every model the session has seen.
    registry: ModelRegistry,
    /// Identity map: ObjectKey -> TrackedObject.
    identity_map: HashMap<ObjectKey, TrackedObject>,
    /// Tracking order; saves and conflict reports follow it.
    order: Vec<ObjectKey>,
    /// Configuration.
    config: SessionConfig,
}

impl<S: Store> Session<S> {
    /// Create a new session over a store.
    pub fn new(store: S) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    /// Create a new session with custom configuration.
    pub fn with_config(store: S, config: SessionConfig) -> Self {
        Self {
            store,
            registry: ModelRegistry::new(),
            identity_map: HashMap::new(),
            order: Vec::new(),
            config,
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a mutable reference to the underlying store.
    ///
    /// Writes made here bypass change tracking, the same way a concurrent
    /// writer would.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Mapping metadata known to the session.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Register a model's mapping metadata.
    pub fn register<M: Model>(&mut self) {
        self.registry.register::<M>();
    }

    fn ensure_registered<M: Model>(&mut self) -> Result<()> {
        if self.registry.contains(EntityType::of::<M>()) {
            return Ok(());
        }
        if self.config.auto_register {
            self.registry.register::<M>();
            return Ok(());
        }
        Err(Error::MetadataUnavailable {
            entity: std::any::type_name::<M>().to_string(),
            reason: "model is not registered with this session".to_string(),
        })
    }

    fn tracked(&self, key: &ObjectKey) -> Result<&TrackedObject> {
        self.identity_map.get(key).ok_or_else(|| not_tracked(key))
    }

    fn tracked_mut(&mut self, key: &ObjectKey) -> Result<&mut TrackedObject> {
        self.identity_map.get_mut(key).ok_or_else(|| not_tracked(key))
    }

    fn track(&mut self, key: ObjectKey, tracked: TrackedObject) {
        if self.identity_map.insert(key, tracked).is_none() {
            self.order.push(key);
        }
    }

    fn untrack(&mut self, key: &ObjectKey) {
        if self.identity_map.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    // ========================================================================
    // Object Tracking
    // ========================================================================

    /// Add a new object to the session.
    ///
    /// The object will be INSERTed on the next `save_changes()` call.
    pub fn add<M: Model>(&mut self, obj: &M) -> Result<()> {
        self.set_entry_state(obj, EntityState::Added)
    }

    /// Track an object as already stored and unchanged.
    pub fn attach<M: Model>(&mut self, obj: &M) -> Result<()> {
        self.set_entry_state(obj, EntityState::Unchanged)
    }

    /// Record new values for an object.
    ///
    /// Untracked objects are attached as `Modified`. Tracked objects take the
    /// new values; an `Unchanged` one becomes `Modified` if they differ from
    /// its baseline, other states are kept.
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn update<M: Model>(&mut self, obj: &M) -> Result<()> {
        let key = ObjectKey::from_model(obj);
        if !self.identity_map.contains_key(&key) {
            return self.set_entry_state(obj, EntityState::Modified);
        }
        self.set_current_values(&key, obj.to_snapshot())
    }

    /// Delete an object from the session.
    ///
    /// The object will be DELETEd on the next `save_changes()` call. An object
    /// that was only added is simply forgotten.
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn delete<M: Model>(&mut self, obj: &M) -> Result<()> {
        let key = ObjectKey::from_model(obj);

        tracing::info!(
            model = std::any::type_name::<M>(),
            table = M::TABLE_NAME,
            "Marking object for deletion"
        );

        match self.identity_map.get(&key).map(|t| t.state) {
            Some(EntityState::Added) => {
                self.untrack(&key);
                Ok(())
            }
            _ => self.set_entry_state(obj, EntityState::Deleted),
        }
    }

    /// Get an object by a single-column primary key.
    pub fn get<M: Model>(&mut self, pk: impl Into<Value>) -> Result<Option<M>> {
        self.find::<M>(&[pk.into()])
    }

    /// Get an object by primary key.
    ///
    /// First checks the identity map, then loads from the store and tracks
    /// the result as `Unchanged`. Objects pending deletion are not returned.
    #[tracing::instrument(level = "debug", skip(self, pk))]
    pub fn find<M: Model>(&mut self, pk: &[Value]) -> Result<Option<M>> {
        let key = ObjectKey::from_pk::<M>(pk);

        tracing::debug!(
            model = std::any::type_name::<M>(),
            table = M::TABLE_NAME,
            "Getting object by primary key"
        );

        if let Some(tracked) = self.identity_map.get(&key) {
            if tracked.state == EntityState::Deleted {
                return Ok(None);
            }
            return M::from_snapshot(&tracked.current).map(Some);
        }

        let Some(row) = self.store.load(M::TABLE_NAME, pk)? else {
            return Ok(None);
        };
        let obj = M::from_snapshot(&row)?;
        self.set_entry_state(&obj, EntityState::Unchanged)?;
        Ok(Some(obj))
    }

    /// Check if an object is tracked by this session.
    pub fn contains<M: Model>(&self, obj: &M) -> bool {
        self.identity_map.contains_key(&ObjectKey::from_model(obj))
    }

    /// Detach an object from the session.
    pub fn expunge<M: Model>(&mut self, obj: &M) {
        self.untrack(&ObjectKey::from_model(obj));
    }

    /// Detach all objects from the session.
    pub fn expunge_all(&mut self) {
        self.identity_map.clear();
        self.order.clear();
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// Write pending changes to the store.
    ///
    /// With `detect_conflicts` on, every `Modified` and `Deleted` entity's
    /// baseline is first compared with its stored row; any mismatch (or a
    /// vanished row) fails the save with [`Error::Concurrency`] and nothing
    /// is written. Returns the number of rows written.
    ///
    /// Writes run between [`Store::begin`] and [`Store::commit`]. If one
    /// fails the store is rolled back and every entity keeps its pending
    /// state, so the save can be retried.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn save_changes(&mut self) -> Result<usize> {
        let start = std::time::Instant::now();
        let info = self.debug_state();

        tracing::info!(
            inserts = info.pending_added,
            updates = info.pending_modified,
            deletes = info.pending_deleted,
            "Starting save"
        );

        self.check_pending()?;

        self.store.begin()?;
        let written = match self.write_pending() {
            Ok(written) => written,
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::warn!(error = %rollback_err, "Store rollback failed");
                }
                tracing::info!(error = %err, "Save failed, store rolled back");
                return Err(err);
            }
        };
        self.store.commit()?;

        // Accept changes
        let deleted: Vec<ObjectKey> = self
            .order
            .iter()
            .filter(|k| self.identity_map[*k].state == EntityState::Deleted)
            .copied()
            .collect();
        for key in &deleted {
            self.untrack(key);
        }
        for tracked in self.identity_map.values_mut() {
            tracked.state = EntityState::Unchanged;
            tracked.original = Some(tracked.current.clone());
        }

        tracing::info!(
            rows = written,
            elapsed_ms = start.elapsed().as_millis(),
            "Save completed"
        );

        Ok(written)
    }

    /// Apply pending deletes, inserts and updates, in that order.
    fn write_pending(&mut self) -> Result<usize> {
        let mut written = 0;

        // 1. DELETEs first
        for key in &self.order {
            let tracked = &self.identity_map[key];
            if tracked.state == EntityState::Deleted
                && self.store.delete(tracked.table_name, &tracked.primary_key)?
            {
                written += 1;
            }
        }

        // 2. INSERTs
        for key in &self.order {
            let tracked = &self.identity_map[key];
            if tracked.state == EntityState::Added {
                self.store
                    .insert(tracked.table_name, &tracked.primary_key, tracked.current.clone())?;
                written += 1;
            }
        }

        // 3. UPDATEs
        for key in &self.order {
            let tracked = &self.identity_map[key];
            if tracked.state == EntityState::Modified
                && self
                    .store
                    .update(tracked.table_name, &tracked.primary_key, tracked.current.clone())?
            {
                written += 1;
            }
        }

        Ok(written)
    }

    /// Validate every pending write before any of them is applied.
    fn check_pending(&self) -> Result<()> {
        let mut report = ConflictReport::default();

        for key in &self.order {
            let tracked = &self.identity_map[key];
            match tracked.state {
                EntityState::Added => {
                    if self
                        .store
                        .load(tracked.table_name, &tracked.primary_key)?
                        .is_some()
                    {
                        return Err(Error::DuplicateKey {
                            table: tracked.table_name.to_string(),
                            key: store::format_key(&tracked.primary_key),
                        });
                    }
                }
                EntityState::Modified | EntityState::Deleted if self.config.detect_conflicts => {
                    let stored = self.store.load(tracked.table_name, &tracked.primary_key)?;
                    let in_conflict = match &stored {
                        Some(row) => !tracked.matches_stored(row),
                        None => true,
                    };
                    if in_conflict {
                        tracing::debug!(
                            model = tracked.entity.name(),
                            table = tracked.table_name,
                            row_exists = stored.is_some(),
                            "Concurrency conflict detected"
                        );
                        report.push(tracked.entry(*key));
                    }
                }
                _ => {}
            }
        }

        if report.is_empty() {
            Ok(())
        } else {
            tracing::info!(entries = report.len(), "Save rejected by concurrency check");
            Err(Error::Concurrency(report))
        }
    }

    // ========================================================================
    // Debug Diagnostics
    // ========================================================================

    /// Get total tracked object count.
    pub fn tracked_count(&self) -> usize {
        self.identity_map.len()
    }

    /// Dump session state for debugging.
    pub fn debug_state(&self) -> SessionDebugInfo {
        let count = |state: EntityState| {
            self.identity_map
                .values()
                .filter(|t| t.state == state)
                .count()
        };
        SessionDebugInfo {
            tracked: self.tracked_count(),
            pending_added: count(EntityState::Added),
            pending_modified: count(EntityState::Modified),
            pending_deleted: count(EntityState::Deleted),
        }
    }
}

fn not_tracked(key: &ObjectKey) -> Error {
    Error::NotTracked {
        entity: format!("entity with key hash {:#x}", key.pk_hash()),
    }
}

impl<S: Store> ChangeTrackingContext for Session<S> {
    fn entry_state<M: Model>(&self, entity: &M) -> EntityState {
        self.identity_map
            .get(&ObjectKey::from_model(entity))
            .map_or(EntityState::Detached, |t| t.state)
    }

    #[tracing::instrument(level = "debug", skip(self, entity))]
    fn set_entry_state<M: Model>(&mut self, entity: &M, state: EntityState) -> Result<()> {
        let key = ObjectKey::from_model(entity);

        tracing::info!(
            model = std::any::type_name::<M>(),
            table = M::TABLE_NAME,
            ?state,
            "Setting entity state"
        );

        if state == EntityState::Detached {
            self.untrack(&key);
            return Ok(());
        }

        self.ensure_registered::<M>()?;

        if !self.identity_map.contains_key(&key) {
            self.track(key, TrackedObject::new(entity, state));
            return Ok(());
        }

        let tracked = self.tracked_mut(&key)?;
        tracked.current = entity.to_snapshot();
        match state {
            EntityState::Added => tracked.original = None,
            EntityState::Unchanged => tracked.original = Some(tracked.current.clone()),
            EntityState::Modified | EntityState::Deleted => {
                if tracked.original.is_none() {
                    tracked.original = Some(tracked.current.clone());
                }
            }
            EntityState::Detached => {}
        }
        tracked.state = state;
        Ok(())
    }

    fn current_values(&self, key: &ObjectKey) -> Result<Snapshot> {
        Ok(self.tracked(key)?.current.clone())
    }

    fn set_current_values(&mut self, key: &ObjectKey, values: Snapshot) -> Result<()> {
        self.validate_current_values(key, &values)?;
        let tracked = self.tracked_mut(key)?;

        if tracked.state == EntityState::Unchanged && tracked.original.as_ref() != Some(&values) {
            tracked.state = EntityState::Modified;
        }
        tracked.current = values;
        Ok(())
    }

    fn validate_current_values(&self, key: &ObjectKey, values: &Snapshot) -> Result<()> {
        let tracked = self.tracked(key)?;

        for (field, pk) in tracked.pk_fields.iter().zip(&tracked.primary_key) {
            if values.get(field).is_some_and(|v| v != pk) {
                return Err(Error::InvalidField {
                    field: (*field).to_string(),
                    reason: "primary key of a tracked entity cannot change".to_string(),
                });
            }
        }
        Ok(())
    }

    fn original_values(&self, key: &ObjectKey) -> Result<Option<Snapshot>> {
        Ok(self.tracked(key)?.original.clone())
    }

    fn set_original_values(&mut self, key: &ObjectKey, values: Snapshot) -> Result<()> {
        self.tracked_mut(key)?.original = Some(values);
        Ok(())
    }

    fn database_values(&self, key: &ObjectKey) -> Result<Option<Snapshot>> {
        let tracked = self.tracked(key)?;
        self.store.load(tracked.table_name, &tracked.primary_key)
    }
}

impl<S: Store> MappingMetadataProvider for Session<S> {
    fn describe(&self, entity: EntityType) -> Result<Option<TableDescriptor>> {
        self.registry.describe(entity)
    }

    fn mapped_types(&self) -> Vec<EntityType> {
        self.registry.mapped_types()
    }
}

/// Debug information about session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDebugInfo {
    /// Total tracked objects.
    pub tracked: usize,
    /// Objects pending INSERT.
    pub pending_added: usize,
    /// Objects pending UPDATE.
    pub pending_modified: usize,
    /// Objects pending DELETE.
    pub pending_deleted: usize,
}

// ============================================================================
// Unit Tests
// ============================================================================
