use core::{fmt, str::FromStr, time::Duration};

use crate::{Error, Result, WorkerId};

/// A 64-bit Snowflake ID shared by every service in the fleet.
///
/// - 1 bit reserved (always zero, so the value fits an `i64` column)
/// - 41 bits timestamp (ms since the generator's epoch, ~69 years)
/// - 10 bits worker ID
/// - 12 bits sequence
///
/// ```text
///  Bit Index:  63           63 62            22 21            12 11             0
///              +--------------+----------------+----------------+---------------+
///  Field:      | reserved (1) | timestamp (41) | worker ID (10) | sequence (12) |
///              +--------------+----------------+----------------+---------------+
///              |<----------- MSB ---------- 64 bits ----------- LSB ----------->|
/// ```
///
/// Ordering on [`FlakeId`] is ordering on the raw integer, which is ordering on
/// `(timestamp, worker_id, sequence)`.
///
/// # Example
///
/// ```
/// use flakeid::FlakeId;
///
/// let id = FlakeId::from_parts(1000, 2, 1);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.worker_id(), 2);
/// assert_eq!(id.sequence(), 1);
/// assert!(id.to_i64() > 0);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FlakeId {
    id: u64,
}

impl FlakeId {
    /// Width of the timestamp field.
    pub const TIMESTAMP_BITS: u32 = 41;

    /// Width of the worker ID field.
    pub const WORKER_ID_BITS: u32 = 10;

    /// Width of the sequence field.
    pub const SEQUENCE_BITS: u32 = 12;

    /// Bitmask for extracting the 41-bit timestamp field. Occupies bits 22
    /// through 62.
    pub const TIMESTAMP_MASK: u64 = (1 << Self::TIMESTAMP_BITS) - 1;

    /// Bitmask for extracting the 10-bit worker ID field. Occupies bits 12
    /// through 21.
    pub const WORKER_ID_MASK: u64 = (1 << Self::WORKER_ID_BITS) - 1;

    /// Bitmask for extracting the 12-bit sequence field. Occupies bits 0
    /// through 11.
    pub const SEQUENCE_MASK: u64 = (1 << Self::SEQUENCE_BITS) - 1;

    /// Number of bits to shift the timestamp to its correct position (bit 22).
    pub const TIMESTAMP_SHIFT: u32 = Self::WORKER_ID_SHIFT + Self::WORKER_ID_BITS;

    /// Number of bits to shift the worker ID to its correct position (bit 12).
    pub const WORKER_ID_SHIFT: u32 = Self::SEQUENCE_SHIFT + Self::SEQUENCE_BITS;

    /// Number of bits to shift the sequence field (bit 0).
    pub const SEQUENCE_SHIFT: u32 = 0;

    /// The reserved sign bit. Never set on a valid ID.
    pub const RESERVED_MASK: u64 = 1 << 63;

    /// Packs the three fields into an ID.
    ///
    /// Each field is masked to its width, so the reserved bit can never be set.
    pub const fn from_parts(timestamp: u64, worker_id: u64, sequence: u64) -> Self {
        let timestamp = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let worker_id = (worker_id & Self::WORKER_ID_MASK) << Self::WORKER_ID_SHIFT;
        let sequence = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
        Self {
            id: timestamp | worker_id | sequence,
        }
    }

    /// Like [`Self::from_parts`], but asserts in debug builds that no field
    /// overflows its width.
    pub fn from_components(timestamp: u64, worker_id: u64, sequence: u64) -> Self {
        debug_assert!(timestamp <= Self::TIMESTAMP_MASK, "timestamp overflow");
        debug_assert!(worker_id <= Self::WORKER_ID_MASK, "worker_id overflow");
        debug_assert!(sequence <= Self::SEQUENCE_MASK, "sequence overflow");
        Self::from_parts(timestamp, worker_id, sequence)
    }

    /// Extracts the timestamp from the packed ID.
    pub const fn timestamp(&self) -> u64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts the worker ID from the packed ID.
    pub const fn worker_id(&self) -> u64 {
        (self.id >> Self::WORKER_ID_SHIFT) & Self::WORKER_ID_MASK
    }

    /// Extracts the sequence number from the packed ID.
    pub const fn sequence(&self) -> u64 {
        (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    /// Returns the maximum possible value for the timestamp field.
    pub const fn max_timestamp() -> u64 {
        Self::TIMESTAMP_MASK
    }

    /// Returns the maximum possible value for the worker ID field.
    pub const fn max_worker_id() -> u64 {
        Self::WORKER_ID_MASK
    }

    /// Returns the maximum possible value for the sequence field.
    pub const fn max_sequence() -> u64 {
        Self::SEQUENCE_MASK
    }

    /// Returns the raw integer.
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Wraps a raw integer without validation.
    ///
    /// Use [`TryFrom<u64>`] when the value comes from outside the process.
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns the ID as a signed integer, for storage in `BIGINT` columns.
    ///
    /// Lossless for every valid ID since the reserved bit is clear.
    pub const fn to_i64(&self) -> i64 {
        self.id as i64
    }

    /// Returns `true` if the reserved bit is clear.
    pub const fn is_valid(&self) -> bool {
        self.id & Self::RESERVED_MASK == 0
    }

    /// Returns true if the current sequence value can be incremented.
    pub const fn has_sequence_room(&self) -> bool {
        self.sequence() < Self::SEQUENCE_MASK
    }

    /// Returns a new ID with the sequence incremented.
    pub fn increment_sequence(&self) -> Self {
        Self::from_components(self.timestamp(), self.worker_id(), self.sequence() + 1)
    }

    /// Returns a new ID for a newer timestamp with sequence reset to zero.
    pub fn rollover_to_timestamp(&self, timestamp: u64) -> Self {
        Self::from_components(timestamp, self.worker_id(), 0)
    }

    /// The absolute time of the timestamp field, given the epoch the
    /// generator was configured with.
    ///
    /// Returns `None` if the sum does not fit in a `u64`.
    pub fn unix_millis(&self, epoch: Duration) -> Option<u64> {
        u64::try_from(epoch.as_millis())
            .ok()?
            .checked_add(self.timestamp())
    }

    /// The worker field as a validated [`WorkerId`].
    pub const fn worker(&self) -> WorkerId {
        WorkerId::from_masked(self.worker_id())
    }

    /// Returns the ID as a zero-padded 20-digit string, which sorts
    /// lexicographically in the same order as the IDs themselves.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl fmt::Display for FlakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for FlakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlakeId")
            .field("raw", &format_args!("0x{:016x}", self.id))
            .field("timestamp", &self.timestamp())
            .field("worker_id", &self.worker_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl From<FlakeId> for u64 {
    fn from(id: FlakeId) -> Self {
        id.to_raw()
    }
}

impl From<FlakeId> for i64 {
    fn from(id: FlakeId) -> Self {
        id.to_i64()
    }
}

impl TryFrom<u64> for FlakeId {
    type Error = Error;

    fn try_from(raw: u64) -> Result<Self> {
        let id = Self::from_raw(raw);
        if id.is_valid() {
            Ok(id)
        } else {
            Err(Error::InvalidId {
                reason: format!("{raw} has the reserved bit set"),
            })
        }
    }
}

impl TryFrom<i64> for FlakeId {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        u64::try_from(raw)
            .map(Self::from_raw)
            .map_err(|_| Error::InvalidId {
                reason: format!("{raw} is negative"),
            })
    }
}

impl FromStr for FlakeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: u64 = s.trim().parse().map_err(|e| Error::InvalidId {
            reason: format!("{s:?}: {e}"),
        })?;
        Self::try_from(raw)
    }
}
