//! Custom conversion registry
//!
//! A [`ConverterCollection`] holds caller-supplied conversions keyed by the exact
//! `(from, to)` type pair. The converter factory consults it before its built-in rules.

use super::shape::{downcast, AnyValue, ConvertFn, Mappable};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered conversion between two types
#[derive(Clone)]
pub struct Conversion {
    from: &'static str,
    to: &'static str,
    convert: ConvertFn,
}

impl Conversion {
    /// Full name of the source type
    pub fn from_type(&self) -> &'static str {
        self.from
    }

    /// Full name of the destination type
    pub fn to_type(&self) -> &'static str {
        self.to
    }

    /// The type-erased conversion
    pub fn convert_fn(&self) -> ConvertFn {
        Arc::clone(&self.convert)
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Custom conversions keyed by exact `(from, to)` type pair
///
/// Cloning copies the table, so a factory built from a collection is unaffected by later
/// changes to it.
#[derive(Clone, Default, Debug)]
pub struct ConverterCollection {
    conversions: HashMap<(TypeId, TypeId), Conversion>,
}

impl ConverterCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion, replacing any previous one for the same pair
    pub fn add<F, T, C>(&mut self, convert: C)
    where
        F: 'static,
        T: Mappable,
        C: Fn(F) -> T + Send + Sync + 'static,
    {
        let erased: ConvertFn =
            Arc::new(move |value: AnyValue| Ok(Box::new(convert(downcast::<F>(value)?)) as AnyValue));
        self.conversions.insert(
            (TypeId::of::<F>(), TypeId::of::<T>()),
            Conversion {
                from: std::any::type_name::<F>(),
                to: std::any::type_name::<T>(),
                convert: erased,
            },
        );
    }

    /// Builder-style variant of [`add`](Self::add)
    pub fn with<F, T, C>(mut self, convert: C) -> Self
    where
        F: 'static,
        T: Mappable,
        C: Fn(F) -> T + Send + Sync + 'static,
    {
        self.add(convert);
        self
    }

    /// Remove the conversion for `F -> T`, returning whether one was registered
    pub fn remove<F: 'static, T: 'static>(&mut self) -> bool {
        self.conversions
            .remove(&(TypeId::of::<F>(), TypeId::of::<T>()))
            .is_some()
    }

    /// Conversion registered for exactly `from -> to`
    pub fn try_get(&self, from: TypeId, to: TypeId) -> Option<&Conversion> {
        self.conversions.get(&(from, to))
    }

    /// Number of registered conversions
    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    /// Whether no conversions are registered
    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}
