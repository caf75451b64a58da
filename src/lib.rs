//! # Rust Record Mapper
//!
//! Maps rows of tabular record sources to strongly-typed Rust values. For a given record
//! schema and target type a converter is resolved once, cached, and then applied to every
//! row without repeating any name lookups.
//!
//! ## Features
//!
//! - **Name-based binding**: constructor parameters and members bind to fields by name;
//!   dotted names (`"Address.City"`) populate nested values
//! - **Null handling**: nullable fields read as the member's default when null; `Option<T>`
//!   becomes `None` when any nullable field feeding `T` is null
//! - **Custom conversions**: register `From -> To` closures for types the built-in rules
//!   don't cover
//! - **Converter caching**: thread-safe, keyed structurally on the schema and the target
//! - **SQLite source**: query results come back as record sets ready for mapping
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_record_mapper::prelude::*;
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct User {
//!     id: i32,
//!     name: Option<String>,
//! }
//!
//! rust_record_mapper::impl_mappable!(User { id: "Id", name: "Name" });
//!
//! fn main() -> Result<()> {
//!     let records = RecordSet::new(vec![
//!         Column::new("Id", FieldType::Int),
//!         Column::nullable("Name", FieldType::String),
//!     ])
//!     .with_row([DatabaseValue::Int(1), "Alice".into()])?
//!     .with_row([DatabaseValue::Int(2), DatabaseValue::Null])?;
//!
//!     let users = ObjectReader::for_reader(records)
//!         .read::<User>()?
//!         .collect::<Result<Vec<_>>>()?;
//!
//!     assert_eq!(users[1], User { id: 2, name: None });
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_record_mapper/
//! ├── src/
//! │   ├── core/              # Values, field types, record traits, errors
//! │   ├── mapping/           # Field maps, shapes, factory, cache, readers
//! │   ├── backends/          # Record source implementations
//! │   ├── macros.rs
//! │   └── lib.rs
//! ├── tests/                 # Integration and property tests
//! ├── benches/               # Criterion benchmarks
//! └── Cargo.toml
//! ```

/// Core record types and traits
pub mod core;

/// Record-to-object mapping engine
pub mod mapping;

/// Database backend implementations
pub mod backends;

mod macros;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_record_mapper::prelude::*;
///
/// let factory = ConverterFactory::new(&ConverterCollection::new());
/// let records = RecordSet::new(vec![Column::new("Id", FieldType::Int)]);
/// assert!(factory.get_converter::<_, Option<i32>>(&records).is_err());
/// ```
pub mod prelude {
    pub use crate::core::{
        Column, Database, DatabaseValue, DataReader, DataRecord, FieldType, MappingError,
        RecordSchema, RecordSet, Result,
    };
    pub use crate::mapping::{
        CacheMode, ConverterCollection, ConverterFactory, IdOf, Mappable, ObjectReader, Shape,
        TargetType, Trampoline, TypedConverter,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::{SqliteConfig, SqliteDatabase};
}

// Re-export at root level for convenience
pub use crate::core::{
    Column, DataReader, DataRecord, DatabaseValue, FieldType, MappingError, RecordSchema,
    RecordSet, Result,
};
pub use mapping::{ConverterCollection, ConverterFactory, Mappable, ObjectReader};

#[cfg(feature = "sqlite")]
pub use backends::SqliteDatabase;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let field_type: FieldType = "string".parse().unwrap();
        assert_eq!(field_type, FieldType::String);
        assert!(matches!(CacheMode::default(), CacheMode::Concurrent));
    }

    #[test]
    fn test_value_conversions() {
        use prelude::*;

        let val: DatabaseValue = 42.into();
        assert_eq!(val.as_int(), Some(42));

        let val: DatabaseValue = "test".into();
        assert_eq!(val.as_string(), "test");

        let val: DatabaseValue = None::<i32>.into();
        assert!(val.is_null());
    }
}
