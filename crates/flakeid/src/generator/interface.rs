use crate::{IdGenStatus, Result, WorkerId};

/// A minimal interface over the single-poll generators.
///
/// Implementors own the `(timestamp, sequence)` state of one worker and update
/// it as a unit. [`IdGenerator`] is generic over this trait so callers can
/// pick the lock-free or the lock-based variant without changing call sites.
///
/// [`IdGenerator`]: crate::IdGenerator
pub trait SnowflakeGenerator {
    /// The worker ID stamped into every issued ID.
    fn worker_id(&self) -> WorkerId;

    /// Polls once for the next ID.
    ///
    /// Reads the clock once per attempt and returns immediately. See
    /// [`IdGenStatus`] for what each outcome means.
    ///
    /// # Errors
    ///
    /// - [`Error::TimestampOverflow`] once the clock passes the 41-bit range.
    /// - [`Error::LockPoisoned`] from lock-based implementations.
    ///
    /// [`Error::TimestampOverflow`]: crate::Error::TimestampOverflow
    /// [`Error::LockPoisoned`]: crate::Error::LockPoisoned
    fn try_next_id(&self) -> Result<IdGenStatus>;
}

impl<G: SnowflakeGenerator + ?Sized> SnowflakeGenerator for &G {
    fn worker_id(&self) -> WorkerId {
        (**self).worker_id()
    }

    fn try_next_id(&self) -> Result<IdGenStatus> {
        (**self).try_next_id()
    }
}

impl<G: SnowflakeGenerator + ?Sized> SnowflakeGenerator for std::sync::Arc<G> {
    fn worker_id(&self) -> WorkerId {
        (**self).worker_id()
    }

    fn try_next_id(&self) -> Result<IdGenStatus> {
        (**self).try_next_id()
    }
}
