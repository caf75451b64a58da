//! Typed integer identifiers

use super::shape::{AnyValue, Mappable, TargetType};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// An `i32` identifier of a `T`
///
/// Read directly from `int` fields without registering a conversion.
pub struct IdOf<T> {
    id: i32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> IdOf<T> {
    /// Wrap a raw identifier
    pub const fn new(id: i32) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The raw identifier
    pub const fn value(&self) -> i32 {
        self.id
    }
}

impl<T> Clone for IdOf<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for IdOf<T> {}

impl<T> Default for IdOf<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> PartialEq for IdOf<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for IdOf<T> {}

impl<T> PartialOrd for IdOf<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for IdOf<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for IdOf<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for IdOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdOf({})", self.id)
    }
}

impl<T> fmt::Display for IdOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<IdOf<T>> for i32 {
    fn from(id: IdOf<T>) -> i32 {
        id.id
    }
}

fn from_int<T: 'static>(id: i32) -> AnyValue {
    Box::new(IdOf::<T>::new(id))
}

impl<T: 'static> Mappable for IdOf<T> {
    fn target_type() -> TargetType {
        TargetType::id_of::<IdOf<T>>(from_int::<T>)
    }
}
