//! Serde support for [`FlakeId`].
//!
//! By default a [`FlakeId`] serializes as its unsigned integer value. The
//! [`as_i64`] and [`as_string`] field adapters cover the other two shapes
//! services put on the wire: a signed `BIGINT` and a decimal string for
//! JSON consumers that lose precision above 2^53.
//!
//! Every deserializer rejects values with the reserved bit set.

use serde::{Deserialize, Deserializer};

use crate::FlakeId;

impl<'de> Deserialize<'de> for FlakeId {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(d)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// (De)serialize a [`FlakeId`] as a signed 64-bit integer.
///
/// ```
/// use flakeid::FlakeId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Row {
///     #[serde(with = "flakeid::as_i64")]
///     id: FlakeId,
/// }
/// ```
pub mod as_i64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::FlakeId;

    /// Serialize a [`FlakeId`] as an `i64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &FlakeId, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        id.to_i64().serialize(s)
    }

    /// Deserialize a [`FlakeId`] from an `i64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying deserializer fails or the value is
    /// negative.
    pub fn deserialize<'de, D>(d: D) -> Result<FlakeId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = i64::deserialize(d)?;
        FlakeId::try_from(n).map_err(serde::de::Error::custom)
    }
}

/// (De)serialize a [`FlakeId`] as a decimal string.
pub mod as_string {
    use serde::{Deserializer, Serializer};

    use crate::FlakeId;

    /// Serialize a [`FlakeId`] as its decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &FlakeId, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(id)
    }

    /// Deserialize a [`FlakeId`] from a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The underlying deserializer fails
    /// - The string is not a decimal integer
    /// - The value has the reserved bit set
    pub fn deserialize<'de, D>(d: D) -> Result<FlakeId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DecimalVisitor;

        impl serde::de::Visitor<'_> for DecimalVisitor {
            type Value = FlakeId;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("a decimal id string")
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(serde::de::Error::custom)
            }
        }

        d.deserialize_str(DecimalVisitor)
    }
}
