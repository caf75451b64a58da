//! Converter factory
//!
//! Resolves a target shape against the field map of a record source and produces a
//! converter plan. Resolution is recursive:
//!
//! - constructors are tried from most to fewest parameters, the first whose parameters
//!   all resolve wins
//! - writable members are then bound by name and applied in source ordinal order
//! - nullable fields read as the member type's default when null
//! - `Option<T>` resolves `T` and yields `None` when any nullable field feeding it is null
//!
//! Built converters are stored in a [`ConverterCache`] keyed on the schema and the target.

use super::cache::{ConcurrentConverterCache, ConverterCache, ConverterCacheKey, NullConverterCache};
use super::conversions::ConverterCollection;
use super::converter::{DataRecordConverter, Trampoline, TypedConverter};
use super::expr::{Expr, MemberBinding};
use super::field_map::FieldMap;
use super::selector::{ArgumentList, Selector};
use super::shape::{
    downcast, short_type_name, AnyValue, ConstructFn, ConvertFn, Mappable, Parameter, Shape,
    TargetKind, TargetType,
};
use crate::core::error::{MappingError, Result};
use crate::core::field_type::FieldType;
use crate::core::record::{DataRecord, RecordSchema};
use crate::core::value::DatabaseValue;
use std::fmt;
use std::sync::Arc;

/// A resolved member or parameter
struct MemberReader {
    member: String,
    ordinal: usize,
    read: Expr,
    is_null: Vec<usize>,
    target: TargetType,
}

impl MemberReader {
    fn into_reader(self) -> Expr {
        if self.is_null.is_empty() {
            return self.read;
        }
        Expr::Condition {
            null_check: self.is_null,
            member: self.member,
            type_name: self.target.name(),
            default: self.target.default_fn(),
            then: Box::new(self.read),
        }
    }
}

/// Build state shared by everything that resolves into one value
#[derive(Default)]
struct ChildBinding {
    is_required: bool,
    any_required_null: Vec<usize>,
}

impl ChildBinding {
    fn required() -> Self {
        Self {
            is_required: true,
            any_required_null: Vec::new(),
        }
    }

    fn add_required_null(&mut self, ordinal: usize) {
        if !self.any_required_null.contains(&ordinal) {
            self.any_required_null.push(ordinal);
        }
    }

    /// Wrap the inner reader as `Some(value)`, absent if any required field is null
    fn into_member_reader(
        mut self,
        reader: MemberReader,
        target: &TargetType,
        wrap: fn(AnyValue) -> Result<AnyValue>,
    ) -> MemberReader {
        for ordinal in reader.is_null {
            self.add_required_null(ordinal);
        }
        let convert: ConvertFn = Arc::new(wrap);
        MemberReader {
            member: reader.member,
            ordinal: reader.ordinal,
            read: Expr::Convert {
                operand: Box::new(reader.read),
                to: target.name(),
                convert,
            },
            is_null: self.any_required_null,
            target: target.clone(),
        }
    }
}

/// Resolves shapes into converter plans for one result type
struct PlanBuilder<'a> {
    result_type: String,
    conversions: &'a ConverterCollection,
}

impl<'a> PlanBuilder<'a> {
    fn new(result_type: String, conversions: &'a ConverterCollection) -> Self {
        Self {
            result_type,
            conversions,
        }
    }

    fn build_type(&self, map: &FieldMap, target: &TargetType) -> Result<Expr> {
        match target.kind() {
            TargetKind::Composite(shape) => {
                let mut root = ChildBinding::default();
                self.member_init(map, &shape(), &mut root)
            }
            TargetKind::Nullable { inner, wrap } => {
                let inner = inner();
                let TargetKind::Composite(shape) = inner.kind() else {
                    return Err(MappingError::no_suitable_constructor(
                        &self.result_type,
                        target.name(),
                    ));
                };
                let mut child = ChildBinding::required();
                let read = self.member_init(map, &shape(), &mut child)?;
                let reader = MemberReader {
                    member: inner.name(),
                    ordinal: map.min_ordinal().unwrap_or(usize::MAX),
                    read,
                    is_null: Vec::new(),
                    target: inner.clone(),
                };
                Ok(child.into_member_reader(reader, target, *wrap).into_reader())
            }
            _ => Err(MappingError::no_suitable_constructor(
                &self.result_type,
                target.name(),
            )),
        }
    }

    fn member_init(&self, map: &FieldMap, shape: &Shape, item: &mut ChildBinding) -> Result<Expr> {
        let new = self.get_ctor(map, shape, item)?;
        let bindings = self.get_members(map, shape, item)?;
        Ok(Expr::MemberInit {
            new: Box::new(new),
            bindings,
        })
    }

    fn get_ctor(&self, map: &FieldMap, shape: &Shape, item: &mut ChildBinding) -> Result<Expr> {
        for ctor in shape.constructors_by_arity() {
            let mark = item.any_required_null.len();
            if let Some(args) = self.try_map_parameters(map, ctor.parameters(), item)? {
                return Ok(Expr::New {
                    type_name: shape.name(),
                    args,
                    construct: ctor.construct_fn(),
                });
            }
            item.any_required_null.truncate(mark);
        }

        if let Some(make) = shape.value_default() {
            return Ok(Expr::Default {
                type_name: shape.name(),
                make,
            });
        }

        Err(MappingError::no_suitable_constructor(
            &self.result_type,
            shape.name(),
        ))
    }

    fn get_members(
        &self,
        map: &FieldMap,
        shape: &Shape,
        item: &mut ChildBinding,
    ) -> Result<Vec<MemberBinding>> {
        let mut found = Vec::with_capacity(shape.members().len());
        for member in shape.members() {
            match self.try_read_or_init(map, member.target(), member.name(), item)? {
                Some(reader) => found.push((
                    reader.ordinal,
                    MemberBinding::new(member.name(), reader.into_reader(), member.assign_fn()),
                )),
                None if member.is_required() => {
                    return Err(MappingError::required_member(
                        &self.result_type,
                        member.name(),
                    ))
                }
                None => {}
            }
        }
        found.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(found.into_iter().map(|(_, binding)| binding).collect())
    }

    fn try_map_parameters(
        &self,
        map: &FieldMap,
        parameters: &[Parameter],
        item: &mut ChildBinding,
    ) -> Result<Option<Vec<Expr>>> {
        let mut args = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            match self.try_read_or_init(map, &parameter.target, &parameter.name, item)? {
                Some(reader) => args.push(reader.into_reader()),
                None => return Ok(None),
            }
        }
        Ok(Some(args))
    }

    fn bind_all_parameters(&self, map: &FieldMap, parameters: &[Parameter]) -> Result<Vec<Expr>> {
        parameters
            .iter()
            .map(|parameter| {
                let mut root = ChildBinding::default();
                self.try_read_or_init(map, &parameter.target, &parameter.name, &mut root)?
                    .map(MemberReader::into_reader)
                    .ok_or_else(|| {
                        MappingError::parameter_unresolved(&self.result_type, &parameter.name)
                    })
            })
            .collect()
    }

    fn try_read_or_init(
        &self,
        map: &FieldMap,
        target: &TargetType,
        name: &str,
        item: &mut ChildBinding,
    ) -> Result<Option<MemberReader>> {
        if let TargetKind::Nullable { inner, wrap } = target.kind() {
            let mut child = ChildBinding::required();
            let resolved = self.try_read_or_init(map, &inner(), name, &mut child)?;
            return Ok(resolved.map(|reader| child.into_member_reader(reader, target, *wrap)));
        }

        if let Some(column) = map.try_get_ordinal(name) {
            let read = self
                .try_convert_field(name, column.ordinal, column.field_type, target)
                .or_else(|| {
                    column.provider_specific_type.and_then(|field_type| {
                        self.try_convert_field(name, column.ordinal, field_type, target)
                    })
                })
                .ok_or_else(|| {
                    MappingError::invalid_conversion(
                        &self.result_type,
                        name,
                        target.name(),
                        column.field_type.to_str(),
                    )
                })?;

            if item.is_required && column.nullable {
                item.add_required_null(column.ordinal);
            }
            return Ok(Some(MemberReader {
                member: name.to_string(),
                ordinal: column.ordinal,
                read,
                is_null: if column.nullable {
                    vec![column.ordinal]
                } else {
                    Vec::new()
                },
                target: target.clone(),
            }));
        }

        if let Some(sub_map) = map.try_get_sub_map(name) {
            if let TargetKind::Composite(shape) = target.kind() {
                let read = self.member_init(sub_map, &shape(), item)?;
                return Ok(Some(MemberReader {
                    member: name.to_string(),
                    ordinal: sub_map.min_ordinal().unwrap_or(usize::MAX),
                    read,
                    is_null: Vec::new(),
                    target: target.clone(),
                }));
            }
        }

        Ok(None)
    }

    /// Read the field as `field_type` and convert it to `target`, if any rule applies
    fn try_convert_field(
        &self,
        member: &str,
        ordinal: usize,
        field_type: FieldType,
        target: &TargetType,
    ) -> Option<Expr> {
        let read = Expr::ReadField {
            member: member.to_string(),
            ordinal,
            field_type,
        };
        let natural = TargetType::for_field(field_type);
        if natural == *target {
            return Some(read);
        }

        let convert = match self.conversions.try_get(natural.id(), target.id()) {
            Some(conversion) => conversion.convert_fn(),
            None => builtin_conversion(member, field_type, target)?,
        };
        Some(Expr::Convert {
            operand: Box::new(read),
            to: target.name(),
            convert,
        })
    }
}

/// Conversions the factory knows without registration
fn builtin_conversion(member: &str, field_type: FieldType, target: &TargetType) -> Option<ConvertFn> {
    match (field_type, target.kind()) {
        (FieldType::Object, _) if target.is::<Vec<u8>>() => {
            let member = member.to_string();
            let convert: ConvertFn = Arc::new(move |value| match downcast::<DatabaseValue>(value)? {
                DatabaseValue::Bytes(bytes) => Ok(Box::new(bytes) as AnyValue),
                other => Err(MappingError::invalid_cast(
                    &member,
                    "bytes",
                    other.type_name(),
                )),
            });
            Some(convert)
        }
        (FieldType::Int, TargetKind::IdOf { from_int }) => {
            let from_int = *from_int;
            let convert: ConvertFn = Arc::new(move |value| Ok(from_int(downcast::<i32>(value)?)));
            Some(convert)
        }
        (_, TargetKind::Enum {
            underlying,
            from_underlying,
        }) if *underlying == field_type => Some(Arc::clone(from_underlying)),
        _ => None,
    }
}

fn parameters(names: &[&str], types: Vec<TargetType>) -> Result<Vec<Parameter>> {
    if names.len() != types.len() {
        return Err(MappingError::other(format!(
            "{} parameter names given for {} parameters",
            names.len(),
            types.len()
        )));
    }
    Ok(names
        .iter()
        .zip(types)
        .map(|(name, target)| Parameter {
            name: (*name).to_string(),
            target,
        })
        .collect())
}

/// How a factory stores built converters
#[derive(Clone, Default)]
pub enum CacheMode {
    /// A private [`ConcurrentConverterCache`]
    #[default]
    Concurrent,
    /// No caching; every request builds
    Disabled,
    /// A cache shared with other factories
    Shared(Arc<dyn ConverterCache>),
}

impl fmt::Debug for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Concurrent => f.write_str("Concurrent"),
            CacheMode::Disabled => f.write_str("Disabled"),
            CacheMode::Shared(_) => f.write_str("Shared"),
        }
    }
}

/// Builder for [`ConverterFactory`]
#[derive(Debug, Default)]
pub struct ConverterFactoryBuilder {
    conversions: ConverterCollection,
    cache: CacheMode,
}

impl ConverterFactoryBuilder {
    /// Use a copy of `conversions`
    pub fn with_conversions(mut self, conversions: &ConverterCollection) -> Self {
        self.conversions = conversions.clone();
        self
    }

    /// Register a single custom conversion
    pub fn with_conversion<F, T, C>(mut self, convert: C) -> Self
    where
        F: 'static,
        T: Mappable,
        C: Fn(F) -> T + Send + Sync + 'static,
    {
        self.conversions.add(convert);
        self
    }

    /// Set how converters are cached
    pub fn with_cache_mode(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Build the factory
    pub fn build(self) -> ConverterFactory {
        let cache: Arc<dyn ConverterCache> = match self.cache {
            CacheMode::Concurrent => Arc::new(ConcurrentConverterCache::new()),
            CacheMode::Disabled => Arc::new(NullConverterCache),
            CacheMode::Shared(cache) => cache,
        };
        ConverterFactory {
            conversions: Arc::new(self.conversions),
            cache,
        }
    }
}

/// Builds and caches converters from record sources to target types
///
/// # Example
///
/// ```rust
/// use rust_record_mapper::prelude::*;
///
/// # fn main() -> Result<()> {
/// let mut records = RecordSet::new(vec![
///     Column::new("Id", FieldType::Int),
///     Column::nullable("Name", FieldType::String),
/// ])
/// .with_row([DatabaseValue::Int(1), DatabaseValue::Null])?;
///
/// let factory = ConverterFactory::new(&ConverterCollection::new());
/// let to_pair = factory.compile_selector(&records, &["Id", "Name"], |id: i32, name: Option<String>| {
///     (id, name)
/// })?;
///
/// assert!(records.advance()?);
/// assert_eq!(to_pair(&records)?, (1, None));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConverterFactory {
    conversions: Arc<ConverterCollection>,
    cache: Arc<dyn ConverterCache>,
}

impl ConverterFactory {
    /// Create a factory with a private concurrent cache, copying `conversions`
    pub fn new(conversions: &ConverterCollection) -> Self {
        Self::builder().with_conversions(conversions).build()
    }

    /// Create a factory storing converters in `cache`, copying `conversions`
    pub fn with_cache(conversions: &ConverterCollection, cache: Arc<dyn ConverterCache>) -> Self {
        Self::builder()
            .with_conversions(conversions)
            .with_cache_mode(CacheMode::Shared(cache))
            .build()
    }

    /// Create a factory builder
    pub fn builder() -> ConverterFactoryBuilder {
        ConverterFactoryBuilder::default()
    }

    /// The custom conversions this factory applies
    pub fn conversions(&self) -> &ConverterCollection {
        &self.conversions
    }

    /// The cache this factory stores converters in
    pub fn cache(&self) -> &Arc<dyn ConverterCache> {
        &self.cache
    }

    /// Converter from rows of `reader` to `T`
    ///
    /// # Errors
    ///
    /// Returns error if `T` cannot be resolved against the schema of `reader`
    pub fn get_converter<R, T>(&self, reader: &R) -> Result<TypedConverter<T>>
    where
        R: RecordSchema + 'static,
        T: Mappable,
    {
        let target = T::target_type();
        let key = ConverterCacheKey::for_type::<R, T>(reader);
        let build = |map: &FieldMap| {
            PlanBuilder::new(target.name(), &self.conversions)
                .build_type(map, &target)
                .map(DataRecordConverter::new)
        };
        let converter = self.cache.get_or_add(reader, key, &build)?;
        Ok(TypedConverter::new(converter))
    }

    /// Converter calling `selector` with parameters bound by `names`
    ///
    /// Selectors that capture nothing are cached per closure type; capturing selectors are
    /// rebuilt on every call.
    ///
    /// # Errors
    ///
    /// Returns error if a parameter cannot be resolved against the schema of `reader`
    pub fn get_selector_converter<R, Args, F>(
        &self,
        reader: &R,
        names: &[&str],
        selector: F,
    ) -> Result<TypedConverter<F::Output>>
    where
        R: RecordSchema + 'static,
        Args: ArgumentList,
        F: Selector<Args>,
    {
        let selector = Arc::new(selector);
        let result_type = short_type_name(std::any::type_name::<F::Output>());
        let parameters = parameters(names, Args::parameter_types())?;
        let build = |map: &FieldMap| -> Result<DataRecordConverter> {
            let args = PlanBuilder::new(result_type.clone(), &self.conversions)
                .bind_all_parameters(map, &parameters)?;
            let selector = Arc::clone(&selector);
            let invoke: ConstructFn = Arc::new(move |values| {
                Ok(Box::new(selector.call(Args::from_values(values)?)) as AnyValue)
            });
            Ok(DataRecordConverter::new(Expr::Invoke {
                target: "selector".to_string(),
                args,
                invoke,
            }))
        };

        let converter = match ConverterCacheKey::for_selector::<R, F>(reader, names) {
            Some(key) => self.cache.get_or_add(reader, key, &build)?,
            None => {
                tracing::trace!(result_type = %result_type, "capturing selector, skipping cache");
                Arc::new(build(&FieldMap::create(reader)?)?)
            }
        };
        Ok(TypedConverter::new(converter))
    }

    /// Compile `selector` into a function over records of `reader`'s schema
    ///
    /// # Errors
    ///
    /// Returns error if a parameter cannot be resolved against the schema of `reader`
    pub fn compile_selector<R, Args, F>(
        &self,
        reader: &R,
        names: &[&str],
        selector: F,
    ) -> Result<impl Fn(&dyn DataRecord) -> Result<F::Output> + Send + Sync>
    where
        R: RecordSchema + 'static,
        Args: ArgumentList,
        F: Selector<Args>,
    {
        let converter = self.get_selector_converter(reader, names, selector)?;
        Ok(move |record: &dyn DataRecord| converter.convert(record))
    }

    /// Argument binder producing `Args` from fields named by `names`
    ///
    /// # Errors
    ///
    /// Returns error if a parameter cannot be resolved against the schema of `reader`
    pub fn get_trampoline<R, Args>(&self, reader: &R, names: &[&str]) -> Result<Trampoline<Args>>
    where
        R: RecordSchema + 'static,
        Args: ArgumentList,
    {
        let parameters = parameters(names, Args::parameter_types())?;
        let key = ConverterCacheKey::for_trampoline::<R, Args>(reader, names);
        let build = |map: &FieldMap| -> Result<DataRecordConverter> {
            let args = PlanBuilder::new(short_type_name(std::any::type_name::<Args>()), &self.conversions)
                .bind_all_parameters(map, &parameters)?;
            Ok(DataRecordConverter::new(Expr::Arguments(args)))
        };
        let converter = self.cache.get_or_add(reader, key, &build)?;
        Ok(Trampoline::new(converter))
    }
}

impl Default for ConverterFactory {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ConverterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterFactory")
            .field("conversions", &self.conversions.len())
            .finish()
    }
}
