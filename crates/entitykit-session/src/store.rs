//! Row storage behind a [`Session`](crate::Session).

use std::collections::HashMap;

use entitykit_core::{Error, Result, Snapshot, Value, hash_values};

/// Keyed row storage used by the session to load rows, fetch stored values
/// during conflict checks, and apply saved changes.
pub trait Store {
    /// The row stored under `pk`, or `None` if there is none.
    fn load(&self, table: &str, pk: &[Value]) -> Result<Option<Snapshot>>;

    /// Insert a new row; fails with `DuplicateKey` if `pk` is taken.
    fn insert(&mut self, table: &str, pk: &[Value], row: Snapshot) -> Result<()>;

    /// Replace an existing row. Returns `false` if there was none.
    fn update(&mut self, table: &str, pk: &[Value], row: Snapshot) -> Result<bool>;

    /// Remove a row. Returns `false` if there was none.
    fn delete(&mut self, table: &str, pk: &[Value]) -> Result<bool>;

    /// Start a batch of writes.
    ///
    /// The default batch hooks do nothing: a store that keeps them must
    /// apply each write on its own, and a failure partway through a save
    /// leaves the earlier writes of that save in place.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Make the writes since [`begin`](Self::begin) permanent.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Undo the writes since [`begin`](Self::begin).
    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

type Tables = HashMap<String, HashMap<u64, Snapshot>>;

/// A [`Store`] holding rows in memory, keyed by table and primary key hash.
///
/// Batches are all-or-nothing: `begin` copies the tables and `rollback`
/// puts the copy back.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Tables,
    savepoint: Option<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, HashMap::len)
    }
}

impl Store for MemoryStore {
    fn load(&self, table: &str, pk: &[Value]) -> Result<Option<Snapshot>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|rows| rows.get(&hash_values(pk)))
            .cloned())
    }

    fn insert(&mut self, table: &str, pk: &[Value], row: Snapshot) -> Result<()> {
        let rows = self.tables.entry(table.to_string()).or_default();
        let hash = hash_values(pk);
        if rows.contains_key(&hash) {
            return Err(Error::DuplicateKey {
                table: table.to_string(),
                key: format_key(pk),
            });
        }
        rows.insert(hash, row);
        Ok(())
    }

    fn update(&mut self, table: &str, pk: &[Value], row: Snapshot) -> Result<bool> {
        let Some(slot) = self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&hash_values(pk)))
        else {
            return Ok(false);
        };
        *slot = row;
        Ok(true)
    }

    fn delete(&mut self, table: &str, pk: &[Value]) -> Result<bool> {
        Ok(self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.remove(&hash_values(pk)))
            .is_some())
    }

    fn begin(&mut self) -> Result<()> {
        self.savepoint = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.savepoint = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(saved) = self.savepoint.take() {
            self.tables = saved;
        }
        Ok(())
    }
}

pub(crate) fn format_key(pk: &[Value]) -> String {
    let parts: Vec<String> = pk.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_load_update_delete() {
        let mut store = MemoryStore::new();
        let pk = [Value::BigInt(1)];
        store
            .insert("t", &pk, Snapshot::new().with("id", 1i64).with("v", "a"))
            .unwrap();
        assert_eq!(store.row_count("t"), 1);

        let row = store.load("t", &pk).unwrap().unwrap();
        assert_eq!(row.get("v"), Some(&Value::Text("a".into())));

        assert!(store.update("t", &pk, Snapshot::new().with("v", "b")).unwrap());
        assert_eq!(
            store.load("t", &pk).unwrap().unwrap().get("v"),
            Some(&Value::Text("b".into()))
        );

        assert!(store.delete("t", &pk).unwrap());
        assert!(!store.delete("t", &pk).unwrap());
        assert!(store.load("t", &pk).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert() {
        let mut store = MemoryStore::new();
        let pk = [Value::BigInt(1)];
        store.insert("t", &pk, Snapshot::new()).unwrap();
        let err = store.insert("t", &pk, Snapshot::new()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref key, .. } if key == "(1)"));
    }

    #[test]
    fn test_update_missing_row() {
        let mut store = MemoryStore::new();
        assert!(!store.update("t", &[Value::Int(9)], Snapshot::new()).unwrap());
    }

    #[test]
    fn test_rollback_restores_tables() {
        let mut store = MemoryStore::new();
        let pk = [Value::BigInt(1)];
        store.insert("t", &pk, Snapshot::new().with("v", "a")).unwrap();

        store.begin().unwrap();
        store.delete("t", &pk).unwrap();
        store.insert("t", &[Value::BigInt(2)], Snapshot::new()).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.row_count("t"), 1);
        assert!(store.load("t", &pk).unwrap().is_some());
    }

    #[test]
    fn test_commit_keeps_writes() {
        let mut store = MemoryStore::new();
        store.begin().unwrap();
        store.insert("t", &[Value::BigInt(1)], Snapshot::new()).unwrap();
        store.commit().unwrap();
        store.rollback().unwrap();
        assert_eq!(store.row_count("t"), 1);
    }
}
