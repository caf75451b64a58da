//! Record-to-object mapping
//!
//! Converters are built per (record schema, target) pair, cached, and reused for every row.

pub mod cache;
pub mod conversions;
pub mod converter;
pub mod expr;
pub mod factory;
pub mod field_map;
pub mod id_of;
pub mod object_reader;
pub mod selector;
pub mod shape;

pub use cache::{
    ConcurrentConverterCache, ConverterCache, ConverterCacheKey, FieldSignature,
    NullConverterCache, TargetKey,
};
pub use conversions::{Conversion, ConverterCollection};
pub use converter::{DataRecordConverter, Trampoline, TypedConverter};
pub use expr::{CompiledFn, Expr, MemberBinding};
pub use factory::{CacheMode, ConverterFactory, ConverterFactoryBuilder};
pub use field_map::{FieldMap, FieldMapItem, NAME_SEPARATOR};
pub use id_of::IdOf;
pub use object_reader::{ObjectReader, Rows};
pub use selector::{ArgumentList, Selector};
pub use shape::{
    default_value, downcast, AnyValue, ConvertFn, Constructor, Mappable, Member, Parameter,
    Shape, ShapeBuilder, TargetKind, TargetType,
};
