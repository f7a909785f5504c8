//! Table metadata lookups for mapped types.

use entitykit_core::{EntityType, MappingMetadataProvider, Model, Result, TableDescriptor};

/// Metadata helpers available on every [`MappingMetadataProvider`].
pub trait TableMetadataExt: MappingMetadataProvider {
    /// Describe the table backing `M`; `Ok(None)` if `M` is not mapped.
    fn describe_table<M: Model>(&self) -> Result<Option<TableDescriptor>> {
        let entity = EntityType::of::<M>();
        let descriptor = self.describe(entity)?;
        tracing::debug!(
            model = entity.name(),
            mapped = descriptor.is_some(),
            "Described table"
        );
        Ok(descriptor)
    }

    /// Describe every mapped type, in registration order.
    fn describe_all(&self) -> Result<Vec<TableDescriptor>> {
        let mut tables = Vec::new();
        for entity in self.mapped_types() {
            if let Some(descriptor) = self.describe(entity)? {
                tables.push(descriptor);
            }
        }
        Ok(tables)
    }

    /// Find the descriptor of a table by name.
    ///
    /// `name` may be a bare table name or `schema.table`; the bare form
    /// matches regardless of schema and returns the first registered match.
    fn find_table(&self, name: &str) -> Result<Option<TableDescriptor>> {
        Ok(self.describe_all()?.into_iter().find(|t| {
            t.table_name() == Some(name) || t.qualified_name().as_deref() == Some(name)
        }))
    }
}

impl<P: MappingMetadataProvider + ?Sized> TableMetadataExt for P {}
