//! Insert-or-update state marking.

use entitykit_core::{ChangeTrackingContext, EntityState, Model, Result};

/// Add-or-update helpers available on every [`ChangeTrackingContext`].
pub trait AddOrUpdateExt: ChangeTrackingContext {
    /// Mark `entity` as `Added` when `should_add` returns true, `Modified`
    /// otherwise. `None` is a no-op.
    ///
    /// The predicate runs exactly once. No key validation happens here; the
    /// context applies its own rules when the state is set.
    #[tracing::instrument(level = "debug", skip_all, fields(model = std::any::type_name::<M>()))]
    fn add_or_update<M, F>(&mut self, entity: Option<&M>, should_add: F) -> Result<()>
    where
        M: Model,
        F: FnOnce(&M) -> bool,
    {
        let Some(entity) = entity else {
            return Ok(());
        };

        let state = if should_add(entity) {
            EntityState::Added
        } else {
            EntityState::Modified
        };
        tracing::debug!(?state, "Resolved add-or-update");
        self.set_entry_state(entity, state)
    }

    /// [`add_or_update`](Self::add_or_update) with the
    /// [`has_unset_primary_key`] predicate.
    fn add_or_update_by_key<M: Model>(&mut self, entity: Option<&M>) -> Result<()> {
        self.add_or_update(entity, has_unset_primary_key::<M>)
    }
}

impl<C: ChangeTrackingContext + ?Sized> AddOrUpdateExt for C {}

/// Whether every primary key value of `entity` is still a placeholder
/// (NULL, zero or empty string).
pub fn has_unset_primary_key<M: Model>(entity: &M) -> bool {
    entity.primary_key_value().iter().all(|v| v.is_unset_key())
}
