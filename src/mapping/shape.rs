//! Target shape descriptors
//!
//! Rust has no runtime reflection, so every type a converter can produce describes itself
//! through [`Mappable`]: a [`TargetType`] saying whether it is a scalar read straight from a
//! field, an `Option` wrapper, an enum over an integer, an [`IdOf`](super::IdOf), or a
//! composite with constructors and assignable members ([`Shape`]).
//!
//! ```rust
//! use rust_record_mapper::mapping::{Mappable, Shape, TargetType};
//!
//! #[derive(Default)]
//! struct Person {
//!     id: i32,
//!     name: Option<String>,
//! }
//!
//! impl Mappable for Person {
//!     fn target_type() -> TargetType {
//!         TargetType::composite::<Person>(|| {
//!             Shape::builder::<Person>()
//!                 .default_constructor()
//!                 .member("Id", |p: &mut Person, v: i32| p.id = v)
//!                 .member("Name", |p: &mut Person, v: Option<String>| p.name = v)
//!                 .build()
//!         })
//!     }
//! }
//! ```

use super::selector::{ArgumentList, Selector};
use crate::core::error::{MappingError, Result};
use crate::core::field_type::FieldType;
use crate::core::value::DatabaseValue;
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Type-erased value flowing through a converter
pub type AnyValue = Box<dyn Any + Send>;

/// Type-erased conversion between two target types
pub type ConvertFn = Arc<dyn Fn(AnyValue) -> Result<AnyValue> + Send + Sync>;

pub(crate) type ConstructFn = Arc<dyn Fn(Vec<AnyValue>) -> Result<AnyValue> + Send + Sync>;
pub(crate) type AssignFn = Arc<dyn Fn(&mut AnyValue, AnyValue) -> Result<()> + Send + Sync>;

/// A type a converter can produce
pub trait Mappable: Sized + Send + 'static {
    /// Describe how values of this type are read or constructed
    fn target_type() -> TargetType;
}

/// Recover a concrete value from an [`AnyValue`]
pub fn downcast<T: 'static>(value: AnyValue) -> Result<T> {
    value.downcast::<T>().map(|v| *v).map_err(|_| {
        MappingError::other(format!(
            "Expected a value of type {}",
            short_type_name(std::any::type_name::<T>())
        ))
    })
}

/// `T::default()` boxed as an [`AnyValue`]
pub fn default_value<T: Default + Send + 'static>() -> AnyValue {
    Box::new(T::default())
}

fn none_value<T: Send + 'static>() -> AnyValue {
    Box::new(None::<T>)
}

fn wrap_some<T: Send + 'static>(value: AnyValue) -> Result<AnyValue> {
    Ok(Box::new(Some(downcast::<T>(value)?)))
}

/// Strip module paths from a `std::any::type_name` string
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut path_start = 0;
    let mut rest = full;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("::") {
            out.truncate(path_start);
            rest = &rest[2..];
            continue;
        }
        out.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            path_start = out.len();
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// How a target type is produced
#[derive(Clone)]
pub enum TargetKind {
    /// Read directly from a field of the given natural type
    Scalar(FieldType),
    /// `Option<T>`; absent when any contributing nullable field is null
    Nullable {
        inner: fn() -> TargetType,
        wrap: fn(AnyValue) -> Result<AnyValue>,
    },
    /// Enum converted from its underlying integer field type
    Enum {
        underlying: FieldType,
        from_underlying: ConvertFn,
    },
    /// Opaque identifier wrapping an `i32`
    IdOf { from_int: fn(i32) -> AnyValue },
    /// Built from constructors and members
    Composite(fn() -> Shape),
}

/// Descriptor of a type a converter can produce
#[derive(Clone)]
pub struct TargetType {
    id: TypeId,
    type_name: &'static str,
    kind: TargetKind,
    default: Option<fn() -> AnyValue>,
}

impl TargetType {
    /// Descriptor of `T`
    pub fn of<T: Mappable>() -> Self {
        T::target_type()
    }

    /// A scalar read straight from a field of `field_type`
    pub fn scalar<T: Default + Send + 'static>(field_type: FieldType) -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: TargetKind::Scalar(field_type),
            default: Some(default_value::<T>),
        }
    }

    /// `Option<T>`
    pub fn nullable<T: Mappable>() -> Self {
        Self {
            id: TypeId::of::<Option<T>>(),
            type_name: std::any::type_name::<Option<T>>(),
            kind: TargetKind::Nullable {
                inner: T::target_type,
                wrap: wrap_some::<T>,
            },
            default: Some(none_value::<T>),
        }
    }

    /// An enum read from its underlying integer field type
    ///
    /// `convert` returns `None` for values that name no variant; reading such a row fails.
    pub fn enumeration<T, U, F>(underlying: FieldType, convert: F) -> Self
    where
        T: Default + Send + 'static,
        U: 'static,
        F: Fn(U) -> Option<T> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let from_underlying: ConvertFn = Arc::new(move |value| {
            let raw = downcast::<U>(value)?;
            convert(raw)
                .map(|v| Box::new(v) as AnyValue)
                .ok_or_else(|| {
                    MappingError::invalid_cast(
                        short_type_name(type_name),
                        underlying.to_str(),
                        "value outside enum range",
                    )
                })
        });
        Self {
            id: TypeId::of::<T>(),
            type_name,
            kind: TargetKind::Enum {
                underlying,
                from_underlying,
            },
            default: Some(default_value::<T>),
        }
    }

    /// An opaque identifier built from an `i32`
    pub fn id_of<T: Default + Send + 'static>(from_int: fn(i32) -> AnyValue) -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: TargetKind::IdOf { from_int },
            default: Some(default_value::<T>),
        }
    }

    /// A composite built from the shape `shape` returns
    pub fn composite<T: Send + 'static>(shape: fn() -> Shape) -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: TargetKind::Composite(shape),
            default: None,
        }
    }

    /// Provide a default value, used when a nullable field is null
    pub fn with_default(mut self, default: fn() -> AnyValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Natural target type of values read from a field of `field_type`
    pub fn for_field(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Object => DatabaseValue::target_type(),
            FieldType::Bool => bool::target_type(),
            FieldType::Byte => u8::target_type(),
            FieldType::Short => i16::target_type(),
            FieldType::Int => i32::target_type(),
            FieldType::Long => i64::target_type(),
            FieldType::Float => f32::target_type(),
            FieldType::Double => f64::target_type(),
            FieldType::String => String::target_type(),
            FieldType::Bytes => Vec::<u8>::target_type(),
            FieldType::Timestamp => DateTime::<Utc>::target_type(),
        }
    }

    /// Type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Short type name (module paths stripped)
    pub fn name(&self) -> String {
        short_type_name(self.type_name)
    }

    /// Full `std::any::type_name` of the type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// How the type is produced
    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    /// Default value constructor, if the type has one
    pub fn default_fn(&self) -> Option<fn() -> AnyValue> {
        self.default
    }

    /// Whether this is `T` with `T: Mappable` itself
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl PartialEq for TargetType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TargetType {}

macro_rules! impl_scalar {
    ($($ty:ty => $field_type:ident),+ $(,)?) => {
        $(
            impl Mappable for $ty {
                fn target_type() -> TargetType {
                    TargetType::scalar::<$ty>(FieldType::$field_type)
                }
            }
        )+
    };
}

impl_scalar!(
    DatabaseValue => Object,
    bool => Bool,
    u8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
);

impl<T: Mappable> Mappable for Option<T> {
    fn target_type() -> TargetType {
        TargetType::nullable::<T>()
    }
}

/// A named, typed constructor or selector parameter
#[derive(Clone, Debug)]
pub struct Parameter {
    /// Name matched against the field map
    pub name: String,
    /// Parameter type
    pub target: TargetType,
}

/// A way to construct a composite from named parameters
#[derive(Clone)]
pub struct Constructor {
    parameters: Vec<Parameter>,
    construct: ConstructFn,
}

impl Constructor {
    /// Parameters in declaration order
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn construct_fn(&self) -> ConstructFn {
        Arc::clone(&self.construct)
    }
}

/// A writable member of a composite
#[derive(Clone)]
pub struct Member {
    name: String,
    target: TargetType,
    required: bool,
    assign: AssignFn,
}

impl Member {
    /// Member name matched against the field map
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member type
    pub fn target(&self) -> &TargetType {
        &self.target
    }

    /// Whether failing to bind this member is fatal
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub(crate) fn assign_fn(&self) -> AssignFn {
        Arc::clone(&self.assign)
    }
}

/// Constructors and members of a composite target type
#[derive(Clone)]
pub struct Shape {
    type_name: &'static str,
    constructors: Vec<Constructor>,
    members: Vec<Member>,
    value_default: Option<fn() -> AnyValue>,
}

impl Shape {
    /// Start describing `T`
    pub fn builder<T: Send + 'static>() -> ShapeBuilder<T> {
        ShapeBuilder {
            shape: Shape {
                type_name: std::any::type_name::<T>(),
                constructors: Vec::new(),
                members: Vec::new(),
                value_default: None,
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Short name of the described type
    pub fn name(&self) -> String {
        short_type_name(self.type_name)
    }

    /// Constructors, most parameters first; ties keep declaration order
    pub fn constructors_by_arity(&self) -> Vec<&Constructor> {
        let mut ctors: Vec<&Constructor> = self.constructors.iter().collect();
        ctors.sort_by(|a, b| b.parameters.len().cmp(&a.parameters.len()));
        ctors
    }

    /// Writable members in declaration order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Default construction used when no constructor resolves (value types only)
    pub fn value_default(&self) -> Option<fn() -> AnyValue> {
        self.value_default
    }
}

/// Builder for [`Shape`]
pub struct ShapeBuilder<T> {
    shape: Shape,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ShapeBuilder<T> {
    /// Add a constructor whose parameters are bound by `names`
    ///
    /// # Panics
    ///
    /// Panics if `names` does not have one entry per closure parameter
    pub fn constructor<Args, F>(mut self, names: &[&str], f: F) -> Self
    where
        Args: ArgumentList,
        F: Selector<Args, Output = T>,
    {
        let types = Args::parameter_types();
        assert_eq!(
            names.len(),
            types.len(),
            "constructor of {} needs one name per parameter",
            short_type_name(self.shape.type_name)
        );
        let parameters = names
            .iter()
            .zip(types)
            .map(|(name, target)| Parameter {
                name: (*name).to_string(),
                target,
            })
            .collect();
        let construct: ConstructFn = Arc::new(move |values| {
            let args = Args::from_values(values)?;
            Ok(Box::new(f.call(args)) as AnyValue)
        });
        self.shape.constructors.push(Constructor {
            parameters,
            construct,
        });
        self
    }

    /// Add a parameterless constructor using `T::default()`
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(&[], T::default)
    }

    /// Mark `T` as a value type: it falls back to `T::default()` when no constructor resolves
    pub fn value_type(mut self) -> Self
    where
        T: Default,
    {
        self.shape.value_default = Some(default_value::<T>);
        self
    }

    /// Add an optional writable member
    pub fn member<M, F>(self, name: &str, assign: F) -> Self
    where
        M: Mappable,
        F: Fn(&mut T, M) + Send + Sync + 'static,
    {
        self.push_member(name, false, assign)
    }

    /// Add a member that must bind, or building the converter fails
    pub fn required_member<M, F>(self, name: &str, assign: F) -> Self
    where
        M: Mappable,
        F: Fn(&mut T, M) + Send + Sync + 'static,
    {
        self.push_member(name, true, assign)
    }

    fn push_member<M, F>(mut self, name: &str, required: bool, assign: F) -> Self
    where
        M: Mappable,
        F: Fn(&mut T, M) + Send + Sync + 'static,
    {
        let type_name = self.shape.type_name;
        let assign: AssignFn = Arc::new(move |target, value| {
            let target = (**target).downcast_mut::<T>().ok_or_else(|| {
                MappingError::other(format!(
                    "Expected a value of type {}",
                    short_type_name(type_name)
                ))
            })?;
            assign(target, downcast::<M>(value)?);
            Ok(())
        });
        self.shape.members.push(Member {
            name: name.to_string(),
            target: M::target_type(),
            required,
            assign,
        });
        self
    }

    /// Finish the shape
    pub fn build(self) -> Shape {
        self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Pair {
        key: i32,
        value: String,
    }

    fn pair_shape() -> Shape {
        Shape::builder::<Pair>()
            .default_constructor()
            .constructor(&["key", "value"], |key: i32, value: String| Pair { key, value })
            .constructor(&["key"], |key: i32| Pair {
                key,
                ..Pair::default()
            })
            .member("value", |p: &mut Pair, v: String| p.value = v)
            .required_member("key", |p: &mut Pair, v: i32| p.key = v)
            .build()
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("i32"), "i32");
        assert_eq!(short_type_name("alloc::string::String"), "String");
        assert_eq!(
            short_type_name("core::option::Option<alloc::string::String>"),
            "Option<String>"
        );
        assert_eq!(
            short_type_name("(i32, alloc::vec::Vec<u8>)"),
            "(i32, Vec<u8>)"
        );
    }

    #[test]
    fn test_scalar_target_types() {
        assert!(matches!(
            i32::target_type().kind(),
            TargetKind::Scalar(FieldType::Int)
        ));
        assert_eq!(TargetType::for_field(FieldType::Long), i64::target_type());
        assert_eq!(TargetType::for_field(FieldType::Bytes).name(), "Vec<u8>");
        assert!(TargetType::for_field(FieldType::Object).is::<DatabaseValue>());
    }

    #[test]
    fn test_nullable_target_type() {
        let target = Option::<i32>::target_type();
        assert_eq!(target.name(), "Option<i32>");
        match target.kind() {
            TargetKind::Nullable { inner, wrap } => {
                assert!(inner().is::<i32>());
                let wrapped = wrap(Box::new(7i32)).unwrap();
                assert_eq!(downcast::<Option<i32>>(wrapped).unwrap(), Some(7));
            }
            _ => panic!("expected nullable"),
        }
        let default = target.default_fn().unwrap()();
        assert_eq!(downcast::<Option<i32>>(default).unwrap(), None);
    }

    #[test]
    fn test_constructors_by_arity() {
        let shape = pair_shape();
        let arities: Vec<usize> = shape
            .constructors_by_arity()
            .iter()
            .map(|c| c.parameters().len())
            .collect();
        assert_eq!(arities, vec![2, 1, 0]);
        assert_eq!(shape.constructors_by_arity()[0].parameters()[1].name, "value");
    }

    #[test]
    fn test_construct_and_assign() {
        let shape = pair_shape();
        let ctor = shape.constructors_by_arity()[1].construct_fn();
        let mut pair = ctor(vec![Box::new(5i32)]).unwrap();

        let member = &shape.members()[0];
        assert_eq!(member.name(), "value");
        assert!(!member.is_required());
        member.assign_fn()(&mut pair, Box::new("five".to_string())).unwrap();

        assert!(shape.members()[1].is_required());
        assert_eq!(
            downcast::<Pair>(pair).unwrap(),
            Pair {
                key: 5,
                value: "five".to_string()
            }
        );
    }

    #[test]
    fn test_enumeration_rejects_unknown_values() {
        #[derive(Default, Debug, PartialEq)]
        enum Color {
            #[default]
            Red,
            Blue,
        }
        let target = TargetType::enumeration(FieldType::Int, |v: i32| match v {
            0 => Some(Color::Red),
            1 => Some(Color::Blue),
            _ => None,
        });
        let TargetKind::Enum {
            underlying,
            from_underlying,
        } = target.kind()
        else {
            panic!("expected enum");
        };
        assert_eq!(*underlying, FieldType::Int);
        let blue = from_underlying(Box::new(1i32)).unwrap();
        assert_eq!(downcast::<Color>(blue).unwrap(), Color::Blue);
        assert!(from_underlying(Box::new(9i32)).is_err());
    }
}
