//! Database value types
//!
//! This module defines the dynamic cell values a record source hands out for its fields.

use super::field_type::FieldType;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Database value that can hold different types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Unsigned 8-bit integer
    Byte(u8),
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Timestamp (Unix timestamp in microseconds)
    Timestamp(i64),
}

impl DatabaseValue {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Byte(v) => Some(*v != 0),
            DatabaseValue::Short(v) => Some(*v != 0),
            DatabaseValue::Int(v) => Some(*v != 0),
            DatabaseValue::Long(v) => Some(*v != 0),
            DatabaseValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get the value as a u8
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            DatabaseValue::Byte(v) => Some(*v),
            DatabaseValue::Short(v) => u8::try_from(*v).ok(),
            DatabaseValue::Int(v) => u8::try_from(*v).ok(),
            DatabaseValue::Long(v) => u8::try_from(*v).ok(),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as u8),
            _ => None,
        }
    }

    /// Get the value as an i16
    pub fn as_short(&self) -> Option<i16> {
        match self {
            DatabaseValue::Short(v) => Some(*v),
            DatabaseValue::Byte(v) => Some(*v as i16),
            DatabaseValue::Int(v) => i16::try_from(*v).ok(),
            DatabaseValue::Long(v) => i16::try_from(*v).ok(),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i16),
            _ => None,
        }
    }

    /// Get the value as an i32
    pub fn as_int(&self) -> Option<i32> {
        match self {
            DatabaseValue::Int(v) => Some(*v),
            DatabaseValue::Byte(v) => Some(*v as i32),
            DatabaseValue::Short(v) => Some(*v as i32),
            DatabaseValue::Long(v) => i32::try_from(*v).ok(),
            DatabaseValue::Float(v) => Some(*v as i32),
            DatabaseValue::Double(v) => Some(*v as i32),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(v) => Some(*v),
            DatabaseValue::Byte(v) => Some(*v as i64),
            DatabaseValue::Short(v) => Some(*v as i64),
            DatabaseValue::Int(v) => Some(*v as i64),
            DatabaseValue::Float(v) => Some(*v as i64),
            DatabaseValue::Double(v) => Some(*v as i64),
            DatabaseValue::String(s) => s.parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            DatabaseValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f32
    pub fn as_float(&self) -> Option<f32> {
        match self {
            DatabaseValue::Float(v) => Some(*v),
            DatabaseValue::Double(v) => Some(*v as f32),
            DatabaseValue::Int(v) => Some(*v as f32),
            DatabaseValue::Long(v) => Some(*v as f32),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(v) => Some(*v),
            DatabaseValue::Float(v) => Some(*v as f64),
            DatabaseValue::Short(v) => Some(*v as f64),
            DatabaseValue::Int(v) => Some(*v as f64),
            DatabaseValue::Long(v) => Some(*v as f64),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string (zero-copy for String values)
    ///
    /// Returns a string reference without cloning for String values.
    /// For other types, use `as_string()` which performs conversion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as a string (with conversion)
    pub fn as_string(&self) -> String {
        match self {
            DatabaseValue::Null => "null".to_string(),
            DatabaseValue::Bool(v) => v.to_string(),
            DatabaseValue::Byte(v) => v.to_string(),
            DatabaseValue::Short(v) => v.to_string(),
            DatabaseValue::Int(v) => v.to_string(),
            DatabaseValue::Long(v) => v.to_string(),
            DatabaseValue::Float(v) => v.to_string(),
            DatabaseValue::Double(v) => v.to_string(),
            DatabaseValue::String(s) => s.clone(),
            DatabaseValue::Bytes(b) => format!("<{} bytes>", b.len()),
            DatabaseValue::Timestamp(v) => v.to_string(),
        }
    }

    /// Get the value as a UTC timestamp
    ///
    /// Integral values are interpreted as Unix microseconds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DatabaseValue::Timestamp(v) | DatabaseValue::Long(v) => {
                Utc.timestamp_micros(*v).single()
            }
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(b) => Some(b),
            DatabaseValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Byte(_) => "byte",
            DatabaseValue::Short(_) => "short",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Long(_) => "long",
            DatabaseValue::Float(_) => "float",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Timestamp(_) => "timestamp",
        }
    }

    /// Get the field type this value naturally belongs to (`None` for null)
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            DatabaseValue::Null => None,
            DatabaseValue::Bool(_) => Some(FieldType::Bool),
            DatabaseValue::Byte(_) => Some(FieldType::Byte),
            DatabaseValue::Short(_) => Some(FieldType::Short),
            DatabaseValue::Int(_) => Some(FieldType::Int),
            DatabaseValue::Long(_) => Some(FieldType::Long),
            DatabaseValue::Float(_) => Some(FieldType::Float),
            DatabaseValue::Double(_) => Some(FieldType::Double),
            DatabaseValue::String(_) => Some(FieldType::String),
            DatabaseValue::Bytes(_) => Some(FieldType::Bytes),
            DatabaseValue::Timestamp(_) => Some(FieldType::Timestamp),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<u8> for DatabaseValue {
    fn from(v: u8) -> Self {
        DatabaseValue::Byte(v)
    }
}

impl From<i16> for DatabaseValue {
    fn from(v: i16) -> Self {
        DatabaseValue::Short(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Long(v)
    }
}

impl From<f32> for DatabaseValue {
    fn from(v: f32) -> Self {
        DatabaseValue::Float(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(v: Vec<u8>) -> Self {
        DatabaseValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(v: DateTime<Utc>) -> Self {
        DatabaseValue::Timestamp(v.timestamp_micros())
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}
