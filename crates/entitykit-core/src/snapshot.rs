//! Ordered field/value sets.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

/// An ordered set of `(field name, value)` pairs.
///
/// The change tracker keeps three of these per entity: the current
/// ("proposed") values, the original (baseline) values, and, on demand, the
/// values presently stored. Order follows `Model::fields()`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    entries: Vec<(String, Value)>,
}

impl Snapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty snapshot with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Overwrite the value of `field`, appending it if absent.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((field, value)),
        }
    }

    /// Value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Decode `field` into a Rust type. A missing field decodes as NULL.
    pub fn decode<T: FromValue>(&self, field: &str) -> Result<T> {
        let null = Value::Null;
        let value = self.get(field).unwrap_or(&null);
        T::from_value(value).ok_or_else(|| Error::InvalidField {
            field: field.to_string(),
            reason: format!(
                "cannot read {} as {}",
                value.type_name(),
                std::any::type_name::<T>()
            ),
        })
    }

    /// Whether `field` is present.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Iterate over `(field, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (field, value) in iter {
            snapshot.set(field, value);
        }
        snapshot
    }
}
