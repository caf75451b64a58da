//! Core record types and traits
//!
//! This module provides the fundamental building blocks the mapping engine consumes:
//! error types, declared field types, dynamic values, and record source traits.

pub mod database;
pub mod error;
pub mod field_type;
pub mod record;
pub mod record_set;
pub mod value;

// Re-export commonly used types
pub use database::Database;
pub use error::{MappingError, Result};
pub use field_type::FieldType;
pub use record::{Column, DataReader, DataRecord, RecordSchema};
pub use record_set::RecordSet;
pub use value::DatabaseValue;
