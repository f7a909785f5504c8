//! Core types and traits for EntityKit.
//!
//! `entitykit-core` is the **contract layer** of the workspace. It defines the
//! data model shared by the helpers and by any host context adapter.
//!
//! # Role In The Architecture
//!
//! - **Capability traits**: `MappingMetadataProvider` (type -> table metadata)
//!   and `ChangeTrackingContext` (state flags and value snapshots) are the two
//!   seams a host mapping runtime implements.
//! - **Data model**: `Value`, `Snapshot`, `FieldInfo` and `Model` describe
//!   mapped entities; `TableDescriptor`/`ColumnDescriptor` are what metadata
//!   lookups return; `ConflictReport` is what a failed save hands back.
//!
//! # Who Uses This Crate
//!
//! - `entitykit-session` implements both capability traits over an in-memory
//!   unit of work.
//! - `entitykit` builds the metadata, add-or-update and conflict helpers on
//!   top of the traits.

pub mod descriptor;
pub mod error;
pub mod field;
pub mod mapping;
pub mod model;
pub mod snapshot;
pub mod tracking;
pub mod types;
pub mod value;

pub use descriptor::{ColumnDescriptor, TableDescriptor};
pub use error::{Error, Result};
pub use field::FieldInfo;
pub use mapping::{MappedModel, MappingMetadataProvider, ModelRegistry};
pub use model::{EntityType, Model};
pub use snapshot::Snapshot;
pub use tracking::{
    ChangeTrackingContext, ConflictEntry, ConflictReport, EntityState, ObjectKey, hash_values,
};
pub use types::SqlType;
pub use value::{FromValue, Value};
