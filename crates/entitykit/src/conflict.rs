//! Optimistic-concurrency conflict resolution.
//!
//! A save that finds stored rows moved under it fails with
//! [`Error::Concurrency`] carrying a [`ConflictReport`]. Resolving the report
//! recomputes each entity's proposed values field by field from a merge
//! callback, then rebases its baseline onto the stored row so the next save
//! compares against what is actually there.
//!
//! ```ignore
//! if let Err(Error::Concurrency(report)) = session.save_changes() {
//!     session.resolve_conflicts::<Hero, _>(&report, |field, mine, theirs| {
//!         if field.name == "name" { mine.clone() } else { theirs.clone() }
//!     })?;
//!     session.save_changes()?;
//! }
//! ```

use entitykit_core::{
    ChangeTrackingContext, ConflictEntry, ConflictReport, Error, FieldInfo, Model, Result,
    Snapshot, Value,
};

/// Ready-made merge policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the in-memory values.
    ClientWins,
    /// Take the stored values.
    StoreWins,
}

/// Merge callback keeping the proposed value.
pub fn client_wins(_field: &FieldInfo, proposed: &Value, _database: &Value) -> Value {
    proposed.clone()
}

/// Merge callback keeping the stored value.
pub fn store_wins(_field: &FieldInfo, _proposed: &Value, database: &Value) -> Value {
    database.clone()
}

/// Conflict resolution available on every [`ChangeTrackingContext`].
pub trait ResolveConflictsExt: ChangeTrackingContext {
    /// Resolve every entry of `report`, all of which must be of type `E`.
    ///
    /// `merge_field(field, proposed, database)` is called once per field of
    /// `E`, in declaration order, and its result replaces the proposed value.
    /// A field missing from either snapshot is passed as `Value::Null`.
    ///
    /// Either every entry is resolved or none is. All entries are checked
    /// and merged before any is written: the first entry of another type
    /// fails with `UnsupportedConflictEntity`, the first whose row is gone
    /// fails with `EntityNoLongerExists`, and the first merged snapshot the
    /// context rejects fails with the context's error. If a write still
    /// fails, entries already written get their previous values back.
    #[tracing::instrument(level = "debug", skip_all, fields(model = std::any::type_name::<E>(), entries = report.len()))]
    fn resolve_conflicts<E, F>(&mut self, report: &ConflictReport, mut merge_field: F) -> Result<()>
    where
        E: Model,
        F: FnMut(&FieldInfo, &Value, &Value) -> Value,
    {
        let mut staged = stage::<E, Self>(self, report)?;

        for entry in &mut staged {
            let mut merged = entry.proposed.clone();
            for field in E::fields() {
                let mine = entry.proposed.get(field.name).cloned().unwrap_or_default();
                let theirs = entry.database.get(field.name).cloned().unwrap_or_default();
                merged.set(field.name, merge_field(field, &mine, &theirs));
            }
            self.validate_current_values(&entry.conflict.key, &merged)?;
            entry.merged = merged;
        }

        for (done, entry) in staged.iter().enumerate() {
            if let Err(err) = apply(self, entry) {
                restore(self, &staged[..=done]);
                return Err(err);
            }
            tracing::debug!(
                table = entry.conflict.table,
                key = %entry.conflict.display_key(),
                "Conflict resolved"
            );
        }

        tracing::info!(entries = report.len(), "Concurrency conflicts resolved");
        Ok(())
    }

    /// [`resolve_conflicts`](Self::resolve_conflicts) with a ready-made policy.
    fn resolve_conflicts_with<E: Model>(
        &mut self,
        report: &ConflictReport,
        strategy: MergeStrategy,
    ) -> Result<()> {
        match strategy {
            MergeStrategy::ClientWins => self.resolve_conflicts::<E, _>(report, client_wins),
            MergeStrategy::StoreWins => self.resolve_conflicts::<E, _>(report, store_wins),
        }
    }
}

impl<C: ChangeTrackingContext + ?Sized> ResolveConflictsExt for C {}

/// One report entry with the values read before anything is written.
struct Staged<'r> {
    conflict: &'r ConflictEntry,
    proposed: Snapshot,
    original: Option<Snapshot>,
    database: Snapshot,
    merged: Snapshot,
}

/// Check every entry and fetch its proposed, baseline and stored values, in
/// report order, without mutating anything.
fn stage<'r, E, C>(context: &C, report: &'r ConflictReport) -> Result<Vec<Staged<'r>>>
where
    E: Model,
    C: ChangeTrackingContext + ?Sized,
{
    let mut staged = Vec::with_capacity(report.len());

    for entry in report {
        if !entry.entity.is::<E>() {
            tracing::debug!(
                expected = std::any::type_name::<E>(),
                found = entry.entity.name(),
                "Conflict entry of unexpected type"
            );
            return Err(Error::UnsupportedConflictEntity {
                expected: std::any::type_name::<E>(),
                found: entry.entity.name().to_string(),
            });
        }

        let Some(database) = context.database_values(&entry.key)? else {
            return Err(Error::EntityNoLongerExists {
                entity: entry.entity.name().to_string(),
                table: entry.table.to_string(),
                key: entry.display_key(),
            });
        };

        staged.push(Staged {
            conflict: entry,
            proposed: context.current_values(&entry.key)?,
            original: context.original_values(&entry.key)?,
            database,
            merged: Snapshot::new(),
        });
    }

    Ok(staged)
}

/// Write the merged values and rebase the baseline onto the stored row.
fn apply<C>(context: &mut C, entry: &Staged<'_>) -> Result<()>
where
    C: ChangeTrackingContext + ?Sized,
{
    context.set_current_values(&entry.conflict.key, entry.merged.clone())?;
    context.set_original_values(&entry.conflict.key, entry.database.clone())
}

/// Put back the values `entries` had before [`apply`].
fn restore<C>(context: &mut C, entries: &[Staged<'_>])
where
    C: ChangeTrackingContext + ?Sized,
{
    for entry in entries.iter().rev() {
        let key = &entry.conflict.key;
        let mut result = context.set_current_values(key, entry.proposed.clone());
        if let (true, Some(original)) = (result.is_ok(), &entry.original) {
            result = context.set_original_values(key, original.clone());
        }
        if let Err(err) = result {
            tracing::warn!(
                table = entry.conflict.table,
                key = %entry.conflict.display_key(),
                error = %err,
                "Could not restore entry after a failed resolution"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitykit_core::{EntityState, ObjectKey, SqlType};
    use entitykit_session::{MemoryStore, Session, Store};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        a: i64,
        b: String,
    }

    static ITEM_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "id", SqlType::BigInt).primary_key(true),
        FieldInfo::new("a", "a", SqlType::BigInt),
        FieldInfo::new("b", "b", SqlType::Text),
    ];

    impl Model for Item {
        const TABLE_NAME: &'static str = "items";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn fields() -> &'static [FieldInfo] {
            ITEM_FIELDS
        }

        fn to_snapshot(&self) -> Snapshot {
            Snapshot::new()
                .with("id", self.id)
                .with("a", self.a)
                .with("b", self.b.as_str())
        }

        fn from_snapshot(values: &Snapshot) -> Result<Self> {
            Ok(Self {
                id: values.decode("id")?,
                a: values.decode("a")?,
                b: values.decode("b")?,
            })
        }
    }

    fn item(id: i64, a: i64, b: &str) -> Item {
        Item {
            id,
            a,
            b: b.to_string(),
        }
    }

    /// Session with `item(id, 1, "orig")` stored and tracked, its proposed
    /// values changed to `mine`, and the stored row moved to `theirs`.
    fn conflicted(mine: &Item, theirs: &Item) -> (Session<MemoryStore>, ConflictReport) {
        let mut session = Session::new(MemoryStore::new());
        session.add(&item(mine.id, 1, "orig")).unwrap();
        session.save_changes().unwrap();

        session.update(mine).unwrap();
        session
            .store_mut()
            .update("items", &[Value::BigInt(theirs.id)], theirs.to_snapshot())
            .unwrap();

        let err = session.save_changes().unwrap_err();
        let report = err.conflicts().cloned().expect("concurrency error");
        (session, report)
    }

    fn key(id: i64) -> ObjectKey {
        ObjectKey::from_pk::<Item>(&[Value::BigInt(id)])
    }

    #[test]
    fn test_client_wins_keeps_proposed_and_rebases() {
        let (mut session, report) = conflicted(&item(1, 7, "y"), &item(1, 5, "x"));

        session
            .resolve_conflicts::<Item, _>(&report, |_, proposed, _| proposed.clone())
            .unwrap();

        let current = session.current_values(&key(1)).unwrap();
        assert_eq!(current.get("a"), Some(&Value::BigInt(7)));
        assert_eq!(current.get("b"), Some(&Value::Text("y".into())));

        let original = session.original_values(&key(1)).unwrap().unwrap();
        assert_eq!(original.get("a"), Some(&Value::BigInt(5)));
        assert_eq!(original.get("b"), Some(&Value::Text("x".into())));
    }

    #[test]
    fn test_store_wins_takes_stored_values() {
        let (mut session, report) = conflicted(&item(1, 7, "y"), &item(1, 5, "x"));

        session
            .resolve_conflicts::<Item, _>(&report, |_, _, database| database.clone())
            .unwrap();

        let current = session.current_values(&key(1)).unwrap();
        assert_eq!(current, item(1, 5, "x").to_snapshot());
    }

    #[test]
    fn test_merge_sees_fields_in_declaration_order() {
        let (mut session, report) = conflicted(&item(1, 7, "y"), &item(1, 5, "x"));

        let mut seen = Vec::new();
        session
            .resolve_conflicts::<Item, _>(&report, |field, proposed, database| {
                seen.push(field.name);
                if field.name == "a" {
                    Value::BigInt(proposed.as_i64().unwrap() + database.as_i64().unwrap())
                } else {
                    database.clone()
                }
            })
            .unwrap();

        assert_eq!(seen, vec!["id", "a", "b"]);
        let current = session.current_values(&key(1)).unwrap();
        assert_eq!(current.get("a"), Some(&Value::BigInt(12)));
    }

    #[test]
    fn test_strategies() {
        let (mut session, report) = conflicted(&item(1, 7, "y"), &item(1, 5, "x"));
        session
            .resolve_conflicts_with::<Item>(&report, MergeStrategy::StoreWins)
            .unwrap();
        assert_eq!(
            session.current_values(&key(1)).unwrap(),
            item(1, 5, "x").to_snapshot()
        );

        let (mut session, report) = conflicted(&item(1, 7, "y"), &item(1, 5, "x"));
        session
            .resolve_conflicts_with::<Item>(&report, MergeStrategy::ClientWins)
            .unwrap();
        assert_eq!(
            session.current_values(&key(1)).unwrap(),
            item(1, 7, "y").to_snapshot()
        );
    }

    #[test]
    fn test_missing_row_fails_without_merging() {
        let mut session = Session::new(MemoryStore::new());
        session.add(&item(1, 1, "one")).unwrap();
        session.add(&item(2, 2, "two")).unwrap();
        session.save_changes().unwrap();

        session.update(&item(1, 10, "one!")).unwrap();
        session.update(&item(2, 20, "two!")).unwrap();
        session
            .store_mut()
            .update("items", &[Value::BigInt(1)], item(1, 11, "theirs").to_snapshot())
            .unwrap();
        session.store_mut().delete("items", &[Value::BigInt(2)]).unwrap();

        let report = session.save_changes().unwrap_err().conflicts().cloned().unwrap();
        assert_eq!(report.len(), 2);

        let before = session.current_values(&key(1)).unwrap();
        let err = session
            .resolve_conflicts::<Item, _>(&report, store_wins)
            .unwrap_err();
        assert!(matches!(err, Error::EntityNoLongerExists { key: ref missing, .. } if missing == "(2)"));

        // Entry 1 precedes the missing row but was left untouched.
        assert_eq!(session.current_values(&key(1)).unwrap(), before);
        assert_eq!(
            session.original_values(&key(1)).unwrap(),
            Some(item(1, 1, "one").to_snapshot())
        );
    }

    /// Items 1 and 2 stored, both changed in memory and moved in the store.
    fn two_conflicted() -> (Session<MemoryStore>, ConflictReport) {
        let mut session = Session::new(MemoryStore::new());
        session.add(&item(1, 1, "one")).unwrap();
        session.add(&item(2, 2, "two")).unwrap();
        session.save_changes().unwrap();

        session.update(&item(1, 10, "mine")).unwrap();
        session.update(&item(2, 20, "mine")).unwrap();
        for id in [1, 2] {
            session
                .store_mut()
                .update("items", &[Value::BigInt(id)], item(id, 0, "theirs").to_snapshot())
                .unwrap();
        }

        let report = session.save_changes().unwrap_err().conflicts().cloned().unwrap();
        assert_eq!(report.len(), 2);
        (session, report)
    }

    #[test]
    fn test_rejected_merge_leaves_earlier_entries_untouched() {
        let (mut session, report) = two_conflicted();
        let current_before = session.current_values(&key(1)).unwrap();
        let original_before = session.original_values(&key(1)).unwrap();

        let err = session
            .resolve_conflicts::<Item, _>(&report, |field, proposed, database| {
                if field.name == "id" && *proposed == Value::BigInt(2) {
                    Value::BigInt(99)
                } else {
                    database.clone()
                }
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidField { ref field, .. } if field == "id"));

        assert_eq!(session.current_values(&key(1)).unwrap(), current_before);
        assert_eq!(session.original_values(&key(1)).unwrap(), original_before);
        assert_eq!(
            session.current_values(&key(2)).unwrap(),
            item(2, 20, "mine").to_snapshot()
        );
    }

    /// Session wrapper refusing new baselines for one entity.
    struct RejectsBaseline {
        inner: Session<MemoryStore>,
        rejected: ObjectKey,
    }

    impl ChangeTrackingContext for RejectsBaseline {
        fn entry_state<M: Model>(&self, entity: &M) -> EntityState {
            self.inner.entry_state(entity)
        }

        fn set_entry_state<M: Model>(&mut self, entity: &M, state: EntityState) -> Result<()> {
            self.inner.set_entry_state(entity, state)
        }

        fn current_values(&self, key: &ObjectKey) -> Result<Snapshot> {
            self.inner.current_values(key)
        }

        fn set_current_values(&mut self, key: &ObjectKey, values: Snapshot) -> Result<()> {
            self.inner.set_current_values(key, values)
        }

        fn original_values(&self, key: &ObjectKey) -> Result<Option<Snapshot>> {
            self.inner.original_values(key)
        }

        fn set_original_values(&mut self, key: &ObjectKey, values: Snapshot) -> Result<()> {
            if *key == self.rejected {
                return Err(Error::NotTracked {
                    entity: "rejected".to_string(),
                });
            }
            self.inner.set_original_values(key, values)
        }

        fn database_values(&self, key: &ObjectKey) -> Result<Option<Snapshot>> {
            self.inner.database_values(key)
        }
    }

    #[test]
    fn test_failed_write_restores_written_entries() {
        let (inner, report) = two_conflicted();
        let mut context = RejectsBaseline {
            inner,
            rejected: key(2),
        };
        let before: Vec<_> = [key(1), key(2)]
            .iter()
            .map(|k| {
                (
                    context.current_values(k).unwrap(),
                    context.original_values(k).unwrap(),
                )
            })
            .collect();

        let err = context
            .resolve_conflicts::<Item, _>(&report, store_wins)
            .unwrap_err();
        assert!(matches!(err, Error::NotTracked { .. }));

        for (k, (current, original)) in [key(1), key(2)].iter().zip(before) {
            assert_eq!(context.current_values(k).unwrap(), current);
            assert_eq!(context.original_values(k).unwrap(), original);
        }
    }
}
