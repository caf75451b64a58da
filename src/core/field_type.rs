//! Declared field type definitions
//!
//! This module defines the declared column types a record source reports for its fields.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Declared type of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum FieldType {
    /// Untyped field, read as a raw [`DatabaseValue`](super::DatabaseValue)
    #[default]
    Object = 0,
    /// Boolean field
    Bool = 1,
    /// Unsigned 8-bit integer field
    Byte = 2,
    /// 16-bit integer field
    Short = 3,
    /// 32-bit integer field
    Int = 4,
    /// 64-bit integer field
    Long = 5,
    /// 32-bit floating point field
    Float = 6,
    /// 64-bit floating point field
    Double = 7,
    /// Text field
    String = 8,
    /// Binary field
    Bytes = 9,
    /// Timestamp field (Unix timestamp in microseconds)
    Timestamp = 10,
}

impl FieldType {
    /// Convert field type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            FieldType::Object => "object",
            FieldType::Bool => "bool",
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Timestamp => "timestamp",
        }
    }

    /// Name of the record accessor used to read a field of this type
    pub fn getter_name(&self) -> &'static str {
        match self {
            FieldType::Object => "get_value",
            FieldType::Bool => "get_bool",
            FieldType::Byte => "get_byte",
            FieldType::Short => "get_short",
            FieldType::Int => "get_int",
            FieldType::Long => "get_long",
            FieldType::Float => "get_float",
            FieldType::Double => "get_double",
            FieldType::String => "get_string",
            FieldType::Bytes => "get_bytes",
            FieldType::Timestamp => "get_timestamp",
        }
    }

    /// Check if this field type holds an integral number
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            FieldType::Byte | FieldType::Short | FieldType::Int | FieldType::Long
        )
    }

    /// Check if this field type holds a floating point number
    pub fn is_floating(&self) -> bool {
        matches!(self, FieldType::Float | FieldType::Double)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "object" | "any" => Ok(FieldType::Object),
            "bool" | "boolean" => Ok(FieldType::Bool),
            "byte" | "u8" | "tinyint" => Ok(FieldType::Byte),
            "short" | "i16" | "int16" | "smallint" => Ok(FieldType::Short),
            "int" | "i32" | "int32" | "integer" => Ok(FieldType::Int),
            "long" | "i64" | "int64" | "bigint" => Ok(FieldType::Long),
            "float" | "f32" | "real" => Ok(FieldType::Float),
            "double" | "f64" => Ok(FieldType::Double),
            "string" | "text" => Ok(FieldType::String),
            "bytes" | "binary" | "blob" => Ok(FieldType::Bytes),
            "timestamp" | "datetime" => Ok(FieldType::Timestamp),
            _ => Err(format!("Invalid field type: '{}'", s)),
        }
    }
}
