/// Declares a domain ID type backed by a [`FlakeId`].
///
/// Services that store several kinds of IDs (orders, order items, reviews)
/// want the compiler to stop them from mixing those up. The generated newtype
/// wraps a [`FlakeId`] and gets the conversions every such type needs:
/// `From<FlakeId>`, `value()` as `u64`, `as_i64()` for `BIGINT` columns,
/// `TryFrom<i64>` for reading them back, `Display` and `FromStr`.
///
/// Attributes on the declaration (doc comments, extra derives) are forwarded.
///
/// # Example
///
/// ```
/// use flakeid::{IdGenerator, flake_id_type};
///
/// flake_id_type! {
///     /// Identifies an order.
///     pub struct OrderId;
/// }
///
/// let generator = IdGenerator::new(1).unwrap();
/// let order_id = OrderId::from(generator.generate().unwrap());
/// assert!(order_id.as_i64() > 0);
/// assert_eq!(order_id.to_string().parse::<OrderId>().unwrap(), order_id);
/// ```
///
/// [`FlakeId`]: crate::FlakeId
#[macro_export]
macro_rules! flake_id_type {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name($crate::FlakeId);

        impl $name {
            /// Wraps an existing ID.
            pub const fn new(id: $crate::FlakeId) -> Self {
                Self(id)
            }

            pub const fn id(&self) -> $crate::FlakeId {
                self.0
            }

            pub const fn value(&self) -> u64 {
                self.0.to_raw()
            }

            pub const fn as_i64(&self) -> i64 {
                self.0.to_i64()
            }
        }

        impl ::core::convert::From<$crate::FlakeId> for $name {
            fn from(id: $crate::FlakeId) -> Self {
                Self(id)
            }
        }

        impl ::core::convert::From<$name> for $crate::FlakeId {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl ::core::convert::From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.as_i64()
            }
        }

        impl ::core::convert::TryFrom<i64> for $name {
            type Error = $crate::Error;

            fn try_from(raw: i64) -> $crate::Result<Self> {
                <$crate::FlakeId as ::core::convert::TryFrom<i64>>::try_from(raw).map(Self)
            }
        }

        impl ::core::convert::TryFrom<u64> for $name {
            type Error = $crate::Error;

            fn try_from(raw: u64) -> $crate::Result<Self> {
                <$crate::FlakeId as ::core::convert::TryFrom<u64>>::try_from(raw).map(Self)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::Error;

            fn from_str(s: &str) -> $crate::Result<Self> {
                s.parse::<$crate::FlakeId>().map(Self)
            }
        }
    };
}
