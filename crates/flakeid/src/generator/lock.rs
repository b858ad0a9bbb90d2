use core::cmp::Ordering;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, FlakeId, IdGenStatus, Result, SnowflakeGenerator, TimeSource, WorkerId,
    generator::Mutex,
};

/// A lock-based Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// This generator wraps the last issued ID in an [`Arc<Mutex<_>>`]. Exactly one
/// caller reads and replaces `(timestamp, sequence)` at a time; the critical
/// section is a clock read and a few integer operations.
///
/// With the `parking-lot` feature the mutex is [`parking_lot::Mutex`], which
/// does not poison. Otherwise it is [`std::sync::Mutex`] and a poisoned lock
/// surfaces as [`Error::LockPoisoned`].
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Fair access across threads
///
/// ## Recommended When
/// - Fair access across threads is important
/// - Your target doesn't support 64-bit atomics
///
/// ## See Also
/// - [`AtomicSnowflakeGenerator`]
///
/// [`AtomicSnowflakeGenerator`]: crate::AtomicSnowflakeGenerator
/// [`parking_lot::Mutex`]: https://docs.rs/parking_lot/latest/parking_lot/type.Mutex.html
#[derive(Debug)]
pub struct LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: Arc<crossbeam_utils::CachePadded<Mutex<FlakeId>>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Arc<Mutex<FlakeId>>,
    worker_id: WorkerId,
    time: T,
}

impl<T> LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a new [`LockSnowflakeGenerator`] for `worker_id`.
    ///
    /// # Example
    /// ```
    /// use flakeid::{IdGenStatus, LockSnowflakeGenerator, SystemClock, WorkerId};
    ///
    /// let generator = LockSnowflakeGenerator::new(WorkerId::new(3).unwrap(), SystemClock::default());
    ///
    /// let id = loop {
    ///     match generator.try_next_id().unwrap() {
    ///         IdGenStatus::Ready { id } => break id,
    ///         _ => std::thread::yield_now(),
    ///     }
    /// };
    /// assert_eq!(id.worker_id(), 3);
    /// ```
    pub fn new(worker_id: WorkerId, time: T) -> Self {
        Self::from_components(0, worker_id, 0, time)
    }

    /// Creates a new generator preloaded with an explicit last-issued
    /// `timestamp` and `sequence`.
    pub fn from_components(timestamp: u64, worker_id: WorkerId, sequence: u64, time: T) -> Self {
        let id = FlakeId::from_components(timestamp, worker_id.get(), sequence);
        Self {
            #[cfg(feature = "cache-padded")]
            state: Arc::new(crossbeam_utils::CachePadded::new(Mutex::new(id))),
            #[cfg(not(feature = "cache-padded"))]
            state: Arc::new(Mutex::new(id)),
            worker_id,
            time,
        }
    }

    /// The time source this generator reads.
    pub fn time(&self) -> &T {
        &self.time
    }

    /// Polls once for the next ID.
    ///
    /// The clock is read while holding the lock, so a caller that waited for
    /// the lock never compares a stale reading against newer state.
    ///
    /// # Errors
    ///
    /// - [`Error::LockPoisoned`] if another thread panicked while holding the
    ///   lock (never with `parking-lot`).
    /// - [`Error::TimestampOverflow`] once the clock passes the 41-bit range.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_next_id(&self) -> Result<IdGenStatus> {
        let mut id = {
            #[cfg(feature = "parking-lot")]
            {
                self.state.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.state.lock()?
            }
        };

        let now = self.time.current_millis();
        let current_ts = id.timestamp();
        match now.cmp(&current_ts) {
            Ordering::Equal => {
                if id.has_sequence_room() {
                    *id = id.increment_sequence();
                    Ok(IdGenStatus::Ready { id: *id })
                } else {
                    Ok(IdGenStatus::Pending { yield_for: 1 })
                }
            }
            Ordering::Greater => {
                if now > FlakeId::max_timestamp() {
                    return Err(Error::TimestampOverflow { timestamp: now });
                }
                *id = id.rollover_to_timestamp(now);
                Ok(IdGenStatus::Ready { id: *id })
            }
            Ordering::Less => Ok(Self::cold_clock_behind(now, current_ts)),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, current_ts: u64) -> IdGenStatus {
        IdGenStatus::ClockBehind {
            drift: current_ts - now,
        }
    }
}

/// Clones are handles to the same state, so IDs issued through any of them
/// stay unique.
impl<T> Clone for LockSnowflakeGenerator<T>
where
    T: TimeSource + Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            worker_id: self.worker_id,
            time: self.time.clone(),
        }
    }
}

impl<T> SnowflakeGenerator for LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    fn try_next_id(&self) -> Result<IdGenStatus> {
        self.try_next_id()
    }
}
