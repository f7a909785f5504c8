//! Type -> table metadata lookup.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::descriptor::TableDescriptor;
use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::model::{EntityType, Model};

/// Capability interface over a mapping context's model metadata.
pub trait MappingMetadataProvider {
    /// Describe the table backing `entity`.
    ///
    /// An unmapped type is `Ok(None)`, not an error. Errors are reserved for
    /// metadata the context holds but cannot resolve.
    fn describe(&self, entity: EntityType) -> Result<Option<TableDescriptor>>;

    /// Every mapped type, in registration order.
    fn mapped_types(&self) -> Vec<EntityType>;
}

/// Mapping metadata recorded for one model type.
#[derive(Debug, Clone)]
pub struct MappedModel {
    pub entity: EntityType,
    pub table_name: &'static str,
    pub schema: Option<&'static str>,
    pub fields: &'static [FieldInfo],
}

impl MappedModel {
    #[must_use]
    pub fn of<M: Model>() -> Self {
        Self {
            entity: EntityType::of::<M>(),
            table_name: M::TABLE_NAME,
            schema: M::SCHEMA,
            fields: M::fields(),
        }
    }

    /// Build the table descriptor, checking the metadata is self-consistent.
    pub fn to_descriptor(&self) -> Result<TableDescriptor> {
        if self.table_name.trim().is_empty() {
            return Err(self.unavailable("table name is empty"));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in self.fields {
            if let Some(column) = field.column_name {
                if !seen.insert(column) {
                    return Err(
                        self.unavailable(format!("column '{}' is mapped more than once", column))
                    );
                }
            }
        }

        Ok(TableDescriptor::from_fields(
            self.table_name,
            self.schema,
            self.fields,
        ))
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::MetadataUnavailable {
            entity: self.entity.name().to_string(),
            reason: reason.into(),
        }
    }
}

/// Registry of mapped models; the in-process mapping metadata source.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<EntityType, MappedModel>,
    order: Vec<EntityType>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M`. Registering twice is a no-op.
    pub fn register<M: Model>(&mut self) {
        let entity = EntityType::of::<M>();
        if self.models.contains_key(&entity) {
            return;
        }
        tracing::debug!(
            model = entity.name(),
            table = M::TABLE_NAME,
            fields = M::fields().len(),
            "Registering model"
        );
        self.models.insert(entity, MappedModel::of::<M>());
        self.order.push(entity);
    }

    #[must_use]
    pub fn contains(&self, entity: EntityType) -> bool {
        self.models.contains_key(&entity)
    }

    #[must_use]
    pub fn get(&self, entity: EntityType) -> Option<&MappedModel> {
        self.models.get(&entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl MappingMetadataProvider for ModelRegistry {
    fn describe(&self, entity: EntityType) -> Result<Option<TableDescriptor>> {
        self.get(entity).map(MappedModel::to_descriptor).transpose()
    }

    fn mapped_types(&self) -> Vec<EntityType> {
        self.order.clone()
    }
}
