//! Typed row ids.
//!
//! Every table keys on `BIGINT`; wrapping the value per entity keeps a
//! payment method id from being passed where an address id is expected.

/// Declare an `i64` id newtype.
///
/// The generated type is `Copy`, ordered by its inner value, serializes as a
/// bare number and parses from a path segment. With the `postgres` feature it
/// binds and decodes as `BIGINT`.
///
/// ```rust
/// # use account_settings_core::define_id;
/// define_id!(InvoiceId);
///
/// let id: InvoiceId = "17".parse().unwrap();
/// assert_eq!(i64::from(id), 17);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(PaymentMethodId);
define_id!(ShippingAddressId);
define_id!(OrderId);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_path_segment() {
        let id: PaymentMethodId = " 42 ".parse().unwrap();
        assert_eq!(id.as_i64(), 42);
        assert!("abc".parse::<PaymentMethodId>().is_err());
    }

    #[test]
    fn test_ordering_follows_inner_value() {
        assert!(ShippingAddressId::new(3) > ShippingAddressId::new(2));
    }

    #[test]
    fn test_serializes_as_bare_number() {
        let json = serde_json::to_string(&UserId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn test_id_slice_becomes_bigint_array() {
        let ids = [PaymentMethodId::new(4), PaymentMethodId::from(9)];
        let raw: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        assert_eq!(raw, vec![4, 9]);
        assert_eq!(i64::from(ids[1]), 9);
        assert_eq!(ids[0].to_string(), "4");
    }
}
