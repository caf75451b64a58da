//! Record source traits
//!
//! A record source exposes a positional schema (name, declared type and nullability per
//! ordinal) and the values of the row it is currently positioned on.

use super::error::Result;
use super::field_type::FieldType;
use super::value::DatabaseValue;
use serde::{Deserialize, Serialize};

/// Positional schema of a tabular record source
pub trait RecordSchema {
    /// Number of fields in each record
    fn field_count(&self) -> usize;

    /// Name of the field at `ordinal`
    fn field_name(&self, ordinal: usize) -> &str;

    /// Declared type of the field at `ordinal`
    fn field_type(&self, ordinal: usize) -> FieldType;

    /// Provider-specific declared type of the field at `ordinal`, if the source has one
    fn provider_specific_field_type(&self, _ordinal: usize) -> Option<FieldType> {
        None
    }

    /// Whether the field at `ordinal` may hold null values
    fn is_nullable(&self, ordinal: usize) -> bool;

    /// Find the ordinal of a field by exact name
    fn ordinal_of(&self, name: &str) -> Option<usize> {
        (0..self.field_count()).find(|&i| self.field_name(i) == name)
    }
}

/// A record source positioned on a single row
pub trait DataRecord: RecordSchema {
    /// Value of the field at `ordinal` in the current row
    fn value(&self, ordinal: usize) -> &DatabaseValue;

    /// Whether the field at `ordinal` is null in the current row
    fn is_null(&self, ordinal: usize) -> bool {
        self.value(ordinal).is_null()
    }
}

/// A forward-only record source
pub trait DataReader: DataRecord {
    /// Advance to the next row, returning `false` once the source is exhausted
    fn advance(&mut self) -> Result<bool>;
}

/// Column definition of a record source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name, possibly dotted (`"Address.City"`)
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Provider-specific declared type
    pub provider_specific_type: Option<FieldType>,
    /// Whether values may be null
    pub nullable: bool,
}

impl Column {
    /// Create a non-nullable column
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            provider_specific_type: None,
            nullable: false,
        }
    }

    /// Create a nullable column
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, field_type)
        }
    }

    /// Set the provider-specific declared type
    pub fn with_provider_specific_type(mut self, field_type: FieldType) -> Self {
        self.provider_specific_type = Some(field_type);
        self
    }
}
