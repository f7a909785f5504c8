//! Error types.

use thiserror::Error;

use crate::tracking::ConflictReport;

#[derive(Debug, Error)]
pub enum Error {
    /// The mapping metadata for a type is missing or inconsistent.
    #[error("metadata unavailable for {entity}: {reason}")]
    MetadataUnavailable { entity: String, reason: String },

    /// The stored row of a conflicting entity was deleted concurrently.
    #[error("{entity} {key} no longer exists in table '{table}'")]
    EntityNoLongerExists {
        entity: String,
        table: String,
        key: String,
    },

    /// A typed conflict resolver was handed an entity of another type.
    #[error("conflict resolver for {expected} cannot resolve an entity of type {found}")]
    UnsupportedConflictEntity {
        expected: &'static str,
        found: String,
    },

    /// A save found stored rows that no longer match their baselines.
    #[error("concurrency conflict on {} entities", .0.len())]
    Concurrency(ConflictReport),

    /// The entity is not tracked by the context.
    #[error("{entity} is not tracked by this context")]
    NotTracked { entity: String },

    /// An insert collided with an existing row.
    #[error("duplicate key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    /// A field value could not be read or written.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl Error {
    /// The conflict report carried by a `Concurrency` error.
    #[must_use]
    pub fn conflicts(&self) -> Option<&ConflictReport> {
        match self {
            Error::Concurrency(report) => Some(report),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ConflictReport;

    #[test]
    fn test_concurrency_message_counts_entries() {
        let err = Error::Concurrency(ConflictReport::default());
        assert_eq!(err.to_string(), "concurrency conflict on 0 entities");
        assert!(err.conflicts().is_some());
    }

    #[test]
    fn test_unsupported_entity_message() {
        let err = Error::UnsupportedConflictEntity {
            expected: "app::Hero",
            found: "app::Team".to_string(),
        };
        assert!(err.to_string().contains("app::Team"));
        assert!(err.conflicts().is_none());
    }
}
