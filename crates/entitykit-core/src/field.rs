//! Field and column definitions.

use crate::types::SqlType;

/// Mapping metadata for one model field.
///
/// Instances are normally `static` and built with the `const fn` builders
/// below, so a model's field list costs nothing at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name; also the key used in snapshots.
    pub name: &'static str,
    /// Database column name (may differ from field name).
    ///
    /// `None` when the mapping does not bind the field to a named column.
    pub column_name: Option<&'static str>,
    /// SQL type for this field, if the mapping declares one.
    pub sql_type: Option<SqlType>,
    /// Explicit SQL type override string (e.g., "VARCHAR(255)", "MONEY").
    /// When set, this takes precedence over `sql_type`.
    pub sql_type_override: Option<&'static str>,
    /// Precision for DECIMAL/NUMERIC types (total digits)
    pub precision: Option<u8>,
    /// Scale for DECIMAL/NUMERIC types (digits after decimal point)
    pub scale: Option<u8>,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is part of the primary key
    pub primary_key: bool,
    /// Whether this field takes part in optimistic concurrency checks.
    ///
    /// When a model marks no field as a token, every field is compared.
    pub concurrency_token: bool,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column_name: Some(column_name),
            sql_type: Some(sql_type),
            sql_type_override: None,
            precision: None,
            scale: None,
            nullable: false,
            primary_key: false,
            concurrency_token: false,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = Some(name);
        self
    }

    /// Set the column name from optional.
    pub const fn column_opt(mut self, name: Option<&'static str>) -> Self {
        self.column_name = name;
        self
    }

    /// Set the SQL type from optional.
    pub const fn sql_type_opt(mut self, sql_type: Option<SqlType>) -> Self {
        self.sql_type = sql_type;
        self
    }

    /// Set explicit SQL type override.
    pub const fn sql_type_override(mut self, type_str: &'static str) -> Self {
        self.sql_type_override = Some(type_str);
        self
    }

    /// Set both precision and scale for DECIMAL/NUMERIC types.
    pub const fn decimal_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set concurrency token flag.
    pub const fn concurrency_token(mut self, value: bool) -> Self {
        self.concurrency_token = value;
        self
    }

    /// Get the effective SQL type name of the column.
    ///
    /// Priority:
    /// 1. `sql_type_override` if set
    /// 2. For DECIMAL/NUMERIC: `precision` and `scale` if both set
    /// 3. `sql_type.sql_name()`
    ///
    /// Returns `None` when the mapping declares no type at all.
    #[must_use]
    pub fn effective_sql_type(&self) -> Option<String> {
        if let Some(override_str) = self.sql_type_override {
            return Some(override_str.to_string());
        }

        let sql_type = self.sql_type?;
        if let (Some(p), Some(s)) = (self.precision, self.scale) {
            match sql_type {
                SqlType::Decimal { .. } => return Some(format!("DECIMAL({}, {})", p, s)),
                SqlType::Numeric { .. } => return Some(format!("NUMERIC({}, {})", p, s)),
                _ => {}
            }
        }
        Some(sql_type.sql_name())
    }
}
