//! Table and column descriptors returned by metadata lookups.

use serde::{Deserialize, Serialize};

use crate::field::FieldInfo;

/// One column of a [`TableDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    column_name: Option<String>,
    column_type: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(column_name: Option<String>, column_type: Option<String>) -> Self {
        Self {
            column_name,
            column_type,
        }
    }

    /// Describe the column a field maps to.
    #[must_use]
    pub fn from_field(field: &FieldInfo) -> Self {
        Self {
            column_name: field.column_name.map(str::to_string),
            column_type: field.effective_sql_type(),
        }
    }

    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }

    #[must_use]
    pub fn column_type(&self) -> Option<&str> {
        self.column_type.as_deref()
    }
}

/// Snapshot of a mapped type's backing table.
///
/// Built fresh on every lookup and never mutated afterwards; columns keep the
/// order in which the mapping declares its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    table_name: Option<String>,
    schema: Option<String>,
    columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(
        table_name: Option<String>,
        schema: Option<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        Self {
            table_name,
            schema,
            columns,
        }
    }

    /// Describe a table from its mapped fields.
    #[must_use]
    pub fn from_fields(table_name: &str, schema: Option<&str>, fields: &[FieldInfo]) -> Self {
        Self {
            table_name: Some(table_name.to_string()),
            schema: schema.map(str::to_string),
            columns: fields.iter().map(ColumnDescriptor::from_field).collect(),
        }
    }

    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// `schema.table`, or just `table` when there is no schema.
    #[must_use]
    pub fn qualified_name(&self) -> Option<String> {
        let table = self.table_name.as_deref()?;
        Some(match self.schema.as_deref() {
            Some(schema) => format!("{}.{}", schema, table),
            None => table.to_string(),
        })
    }

    /// Find a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.column_name() == Some(name))
    }
}
