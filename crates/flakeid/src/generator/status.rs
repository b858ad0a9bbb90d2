use crate::FlakeId;

/// Represents the result of polling a generator once.
///
/// - [`IdGenStatus::Ready`]: a new ID was issued.
/// - [`IdGenStatus::Pending`]: the current millisecond's 4096 sequence values
///   are used up. Poll again once the clock has advanced.
/// - [`IdGenStatus::ClockBehind`]: the clock reads earlier than the last issued
///   timestamp. Issuing now could repeat a `(timestamp, sequence)` pair, so
///   nothing was issued.
///
/// Polling never mutates state unless it returns `Ready`, so any status can
/// be abandoned without leaving the generator inconsistent. [`IdGenerator`]
/// turns this into a blocking call with bounded waits.
///
/// # Example
///
/// ```
/// use flakeid::{AtomicSnowflakeGenerator, FlakeId, IdGenStatus, TimeSource, WorkerId};
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1
///     }
/// }
///
/// let worker = WorkerId::new(7).unwrap();
/// let generator = AtomicSnowflakeGenerator::from_components(1, worker, FlakeId::max_sequence(), FixedTime);
/// match generator.try_next_id().unwrap() {
///     IdGenStatus::Ready { id } => println!("ID: {id}"),
///     IdGenStatus::Pending { yield_for } => println!("Back off for {yield_for}ms"),
///     IdGenStatus::ClockBehind { drift } => println!("Clock is {drift}ms behind"),
/// }
/// ```
///
/// [`IdGenerator`]: crate::IdGenerator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique ID was generated and is ready to use.
    Ready {
        /// The generated ID.
        id: FlakeId,
    },
    /// No ID could be generated because the sequence has been exhausted for the
    /// current millisecond.
    Pending {
        /// Milliseconds to wait before polling again.
        yield_for: u64,
    },
    /// No ID could be generated because the clock moved backward.
    ClockBehind {
        /// How far the clock is behind the last issued timestamp, in
        /// milliseconds.
        drift: u64,
    },
}

impl IdGenStatus {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}
