//! Converter caching
//!
//! Converters are keyed structurally: the record source type, the ordered field
//! signatures of its schema, and the target. Two distinct sources with identical schemas
//! share a converter.

use super::converter::DataRecordConverter;
use super::field_map::FieldMap;
use super::shape::{short_type_name, Mappable};
use super::selector::ArgumentList;
use crate::core::error::Result;
use crate::core::field_type::FieldType;
use crate::core::record::RecordSchema;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name, declared types and nullability of one schema field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSignature {
    pub name: String,
    pub field_type: FieldType,
    pub provider_specific_type: Option<FieldType>,
    pub nullable: bool,
}

/// What a cached converter produces
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKey {
    /// A [`Mappable`] type
    Type { id: TypeId, name: String },
    /// A capture-free selector closure bound by parameter names
    Selector { id: TypeId, parameters: Vec<String> },
    /// An argument binder for a trampoline
    Trampoline { parameters: Vec<(String, TypeId)> },
}

/// Structural cache key of a converter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConverterCacheKey {
    record_type: TypeId,
    record_type_name: String,
    fields: Vec<FieldSignature>,
    target: TargetKey,
}

impl ConverterCacheKey {
    fn new<R: RecordSchema + ?Sized + 'static>(schema: &R, target: TargetKey) -> Self {
        let fields = (0..schema.field_count())
            .map(|ordinal| FieldSignature {
                name: schema.field_name(ordinal).to_string(),
                field_type: schema.field_type(ordinal),
                provider_specific_type: schema.provider_specific_field_type(ordinal),
                nullable: schema.is_nullable(ordinal),
            })
            .collect();
        Self {
            record_type: TypeId::of::<R>(),
            record_type_name: short_type_name(std::any::type_name::<R>()),
            fields,
            target,
        }
    }

    /// Key of a converter from `schema` to `T`
    pub fn for_type<R, T>(schema: &R) -> Self
    where
        R: RecordSchema + ?Sized + 'static,
        T: Mappable,
    {
        let target = T::target_type();
        Self::new(
            schema,
            TargetKey::Type {
                id: target.id(),
                name: target.name(),
            },
        )
    }

    /// Key of a selector converter, or `None` when the closure captures state
    pub fn for_selector<R, F>(schema: &R, names: &[&str]) -> Option<Self>
    where
        R: RecordSchema + ?Sized + 'static,
        F: 'static,
    {
        if std::mem::size_of::<F>() != 0 {
            return None;
        }
        Some(Self::new(
            schema,
            TargetKey::Selector {
                id: TypeId::of::<F>(),
                parameters: names.iter().map(|name| name.to_string()).collect(),
            },
        ))
    }

    /// Key of an argument binder for `Args` under `names`
    pub fn for_trampoline<R, Args>(schema: &R, names: &[&str]) -> Self
    where
        R: RecordSchema + ?Sized + 'static,
        Args: ArgumentList,
    {
        let parameters = names
            .iter()
            .zip(Args::parameter_types())
            .map(|(name, target)| (name.to_string(), target.id()))
            .collect();
        Self::new(schema, TargetKey::Trampoline { parameters })
    }

    /// Field signatures in ordinal order
    pub fn fields(&self) -> &[FieldSignature] {
        &self.fields
    }

    /// Target part of the key
    pub fn target(&self) -> &TargetKey {
        &self.target
    }
}

impl fmt::Display for ConverterCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.record_type_name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", field.name, field.field_type)?;
            if field.nullable {
                f.write_str("?")?;
            }
        }
        f.write_str(")->")?;
        match &self.target {
            TargetKey::Type { name, .. } => f.write_str(name),
            TargetKey::Selector { parameters, .. } => write!(f, "|{}|", parameters.join(", ")),
            TargetKey::Trampoline { parameters } => {
                f.write_str("(")?;
                for (i, (name, _)) in parameters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Builds a converter from the field map of a schema
pub type BuildFn<'a> = &'a dyn Fn(&FieldMap) -> Result<DataRecordConverter>;

/// Storage for built converters
pub trait ConverterCache: Send + Sync {
    /// Return the converter stored under `key`, building and storing it on a miss
    ///
    /// The field map of `schema` is only computed when a build is needed.
    fn get_or_add(
        &self,
        schema: &dyn RecordSchema,
        key: ConverterCacheKey,
        build: BuildFn<'_>,
    ) -> Result<Arc<DataRecordConverter>>;
}

/// Thread-safe converter cache
///
/// Lookups take a read lock. Builds run outside any lock; when two threads race on the
/// same key the first stored converter wins and both callers receive it.
#[derive(Default)]
pub struct ConcurrentConverterCache {
    converters: RwLock<HashMap<ConverterCacheKey, Arc<DataRecordConverter>>>,
}

impl ConcurrentConverterCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored converters
    pub fn len(&self) -> usize {
        self.converters.read().len()
    }

    /// Whether nothing is stored yet
    pub fn is_empty(&self) -> bool {
        self.converters.read().is_empty()
    }

    /// Drop all stored converters
    pub fn clear(&self) {
        self.converters.write().clear();
    }
}

impl ConverterCache for ConcurrentConverterCache {
    fn get_or_add(
        &self,
        schema: &dyn RecordSchema,
        key: ConverterCacheKey,
        build: BuildFn<'_>,
    ) -> Result<Arc<DataRecordConverter>> {
        if let Some(converter) = self.converters.read().get(&key) {
            tracing::trace!(key = %key, "converter cache hit");
            return Ok(Arc::clone(converter));
        }

        let map = FieldMap::create(schema)?;
        let built = Arc::new(build(&map)?);
        tracing::debug!(key = %key, plan = %built.expression(), "built converter");

        let mut converters = self.converters.write();
        let stored = converters.entry(key).or_insert_with(|| Arc::clone(&built));
        if !Arc::ptr_eq(stored, &built) {
            tracing::debug!("concurrent build lost the race, using stored converter");
        }
        Ok(Arc::clone(stored))
    }
}

impl fmt::Debug for ConcurrentConverterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentConverterCache")
            .field("len", &self.len())
            .finish()
    }
}

/// A cache that stores nothing; every request builds a fresh converter
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConverterCache;

impl ConverterCache for NullConverterCache {
    fn get_or_add(
        &self,
        schema: &dyn RecordSchema,
        key: ConverterCacheKey,
        build: BuildFn<'_>,
    ) -> Result<Arc<DataRecordConverter>> {
        let map = FieldMap::create(schema)?;
        let built = build(&map)?;
        tracing::debug!(key = %key, plan = %built.expression(), "built uncached converter");
        Ok(Arc::new(built))
    }
}
