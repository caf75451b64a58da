/// Implement [`Mappable`](crate::mapping::Mappable) for a `Default` struct by listing the
/// fields to assign and the source field names they bind to.
///
/// ```rust
/// use rust_record_mapper::impl_mappable;
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     email: Option<String>,
/// }
///
/// impl_mappable!(User { id: "Id", email: "Email" });
/// ```
#[macro_export]
macro_rules! impl_mappable {
    ($ty:ty { $($field:ident : $name:literal),* $(,)? }) => {
        impl $crate::mapping::Mappable for $ty {
            fn target_type() -> $crate::mapping::TargetType {
                $crate::mapping::TargetType::composite::<$ty>(|| {
                    $crate::mapping::Shape::builder::<$ty>()
                        .default_constructor()
                        $(.member($name, |target: &mut $ty, value| target.$field = value))*
                        .build()
                })
            }
        }
    };
}
