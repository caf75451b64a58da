//! Named-argument closures
//!
//! Constructors, selectors and trampolines all bind a list of named, typed parameters
//! against a field map. [`ArgumentList`] describes such a list (a tuple of [`Mappable`]
//! types) and [`Selector`] is any closure that accepts it.

use super::shape::{downcast, AnyValue, Mappable, TargetType};
use crate::core::error::{MappingError, Result};

/// A tuple of mappable argument types
pub trait ArgumentList: Sized + Send + 'static {
    /// Target types of the arguments, in order
    fn parameter_types() -> Vec<TargetType>;

    /// Rebuild the tuple from type-erased values produced by a converter
    fn from_values(values: Vec<AnyValue>) -> Result<Self>;
}

/// A closure over an [`ArgumentList`]
pub trait Selector<Args: ArgumentList>: Send + Sync + 'static {
    /// Value produced by the closure
    type Output: Send + 'static;

    /// Call the closure with a bound argument tuple
    fn call(&self, args: Args) -> Self::Output;
}

impl ArgumentList for () {
    fn parameter_types() -> Vec<TargetType> {
        Vec::new()
    }

    fn from_values(_values: Vec<AnyValue>) -> Result<Self> {
        Ok(())
    }
}

impl<Func, Out> Selector<()> for Func
where
    Func: Fn() -> Out + Send + Sync + 'static,
    Out: Send + 'static,
{
    type Output = Out;

    fn call(&self, _args: ()) -> Out {
        (self)()
    }
}

fn next_argument(values: &mut std::vec::IntoIter<AnyValue>) -> Result<AnyValue> {
    values
        .next()
        .ok_or_else(|| MappingError::other("Too few arguments for selector"))
}

macro_rules! impl_argument_list {
    ($($name:ident),+) => {
        impl<$($name: Mappable),+> ArgumentList for ($($name,)+) {
            fn parameter_types() -> Vec<TargetType> {
                vec![$($name::target_type()),+]
            }

            fn from_values(values: Vec<AnyValue>) -> Result<Self> {
                let mut values = values.into_iter();
                Ok(($(downcast::<$name>(next_argument(&mut values)?)?,)+))
            }
        }

        impl<Func, Out, $($name: Mappable),+> Selector<($($name,)+)> for Func
        where
            Func: Fn($($name),+) -> Out + Send + Sync + 'static,
            Out: Send + 'static,
        {
            type Output = Out;

            #[allow(non_snake_case)]
            fn call(&self, args: ($($name,)+)) -> Out {
                let ($($name,)+) = args;
                (self)($($name),+)
            }
        }
    };
}

impl_argument_list!(A1);
impl_argument_list!(A1, A2);
impl_argument_list!(A1, A2, A3);
impl_argument_list!(A1, A2, A3, A4);
impl_argument_list!(A1, A2, A3, A4, A5);
impl_argument_list!(A1, A2, A3, A4, A5, A6);
impl_argument_list!(A1, A2, A3, A4, A5, A6, A7);
