use core::time::Duration;

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `flakeid` can emit.
///
/// Errors fall into two groups:
///
/// - **Fatal** (construction time): [`Error::InvalidWorkerId`],
///   [`Error::WorkerIdUnavailable`], [`Error::ClockBeforeEpoch`]. The owning
///   process should refuse to start.
/// - **Transient** (call time): [`Error::ClockMovedBackward`],
///   [`Error::GenerationTimeout`]. The caller may retry after a backoff; the
///   generator state is never left half-updated by a failed call.
///
/// The generator never logs these. It hands them back and lets the caller
/// decide.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The worker ID does not fit in the 10-bit worker field.
    #[error("worker id {value} is out of range (expected 0..={max})")]
    InvalidWorkerId {
        /// The rejected value.
        value: u64,
        /// The largest accepted worker ID.
        max: u64,
    },

    /// A [`WorkerIdSource`] could not produce a worker ID at all.
    ///
    /// [`WorkerIdSource`]: crate::WorkerIdSource
    #[error("worker id unavailable: {reason}")]
    WorkerIdUnavailable {
        /// Why the source failed.
        reason: String,
    },

    /// The wall clock reads earlier than the configured epoch.
    #[error("system clock is earlier than the configured epoch")]
    ClockBeforeEpoch,

    /// The clock reads earlier than the timestamp of the last issued ID.
    #[error("clock moved backward by {drift_ms}ms")]
    ClockMovedBackward {
        /// How far behind the last issued timestamp the clock is, in
        /// milliseconds.
        drift_ms: u64,
    },

    /// A bounded wait for the clock (sequence exhaustion or tolerated drift)
    /// exceeded the configured ceiling.
    #[error("gave up generating an id after waiting {waited:?}")]
    GenerationTimeout {
        /// Total time spent waiting before giving up.
        waited: Duration,
    },

    /// The clock is past the last millisecond representable in 41 bits.
    #[error("timestamp {timestamp}ms exceeds the 41-bit timestamp range")]
    TimestampOverflow {
        /// Milliseconds since the epoch reported by the clock.
        timestamp: u64,
    },

    /// The operation failed because the generator lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do **not** poison, so this
    /// variant is never produced.
    #[error("generator lock poisoned")]
    LockPoisoned,

    /// A value could not be interpreted as an ID.
    #[error("invalid id: {reason}")]
    InvalidId {
        /// What was wrong with the input.
        reason: String,
    },
}

impl Error {
    /// Returns `true` for call-time errors that a caller may retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ClockMovedBackward { .. } | Self::GenerationTimeout { .. }
        )
    }
}

#[cfg(not(feature = "parking-lot"))]
impl<T> From<std::sync::PoisonError<std::sync::MutexGuard<'_, T>>> for Error {
    fn from(_: std::sync::PoisonError<std::sync::MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(Error::ClockMovedBackward { drift_ms: 5 }.is_retryable());
        assert!(
            Error::GenerationTimeout {
                waited: Duration::from_millis(50)
            }
            .is_retryable()
        );
        assert!(!Error::InvalidWorkerId { value: 1024, max: 1023 }.is_retryable());
        assert!(!Error::LockPoisoned.is_retryable());
    }

    #[test]
    fn display_carries_the_drift() {
        let err = Error::ClockMovedBackward { drift_ms: 5 };
        assert_eq!(err.to_string(), "clock moved backward by 5ms");
    }
}
