//! EntityKit: helpers for change-tracking mapping contexts.
//!
//! Three small operations on top of a host mapping runtime:
//!
//! - [`TableMetadataExt::describe_table`]: table name, schema and ordered
//!   `(column name, column type)` pairs for a mapped type.
//! - [`AddOrUpdateExt::add_or_update`]: mark an entity `Added` or `Modified`
//!   from a predicate.
//! - [`ResolveConflictsExt::resolve_conflicts`]: merge proposed and stored
//!   values of entities a save reported in conflict, then rebase their
//!   baselines so the save can be retried.
//!
//! Each is an extension trait blanket-implemented for the capability traits
//! in `entitykit-core`, so any adapter implementing `MappingMetadataProvider`
//! or `ChangeTrackingContext` gets them for free. The in-memory
//! [`Session`](session::Session) from `entitykit-session` is re-exported as
//! the reference context.
//!
//! # Example
//!
//! ```ignore
//! use entitykit::prelude::*;
//!
//! let mut session = Session::new(MemoryStore::new());
//! session.add_or_update(Some(&hero), |h| h.id == 0)?;
//!
//! if let Err(Error::Concurrency(report)) = session.save_changes() {
//!     session.resolve_conflicts_with::<Hero>(&report, MergeStrategy::ClientWins)?;
//!     session.save_changes()?;
//! }
//! ```

pub mod conflict;
pub mod metadata;
pub mod state;

pub use conflict::{MergeStrategy, ResolveConflictsExt, client_wins, store_wins};
pub use metadata::TableMetadataExt;
pub use state::{AddOrUpdateExt, has_unset_primary_key};

pub use entitykit_core::{
    ChangeTrackingContext, ColumnDescriptor, ConflictEntry, ConflictReport, EntityState,
    EntityType, Error, FieldInfo, FromValue, MappingMetadataProvider, Model, ModelRegistry,
    ObjectKey, Result, Snapshot, SqlType, TableDescriptor, Value,
};

/// The in-memory reference context.
pub mod session {
    pub use entitykit_session::{MemoryStore, Session, SessionConfig, SessionDebugInfo, Store};
}

/// Everything needed to define models and use the helpers.
pub mod prelude {
    pub use crate::conflict::{MergeStrategy, ResolveConflictsExt, client_wins, store_wins};
    pub use crate::metadata::TableMetadataExt;
    pub use crate::session::{MemoryStore, Session, SessionConfig, Store};
    pub use crate::state::AddOrUpdateExt;
    pub use entitykit_core::{
        ChangeTrackingContext, ConflictReport, EntityState, Error, FieldInfo,
        MappingMetadataProvider, Model, Result, Snapshot, SqlType, TableDescriptor, Value,
    };
}
