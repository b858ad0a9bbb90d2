#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AtomicSnowflakeGenerator, FlakeId, GeneratorOptions, Result, SnowflakeGenerator, SystemClock,
    WorkerId, WorkerIdSource,
    generator::{Backoff, Step, Waiter},
};

/// The generator services call: `generate()` in, unique ID out.
///
/// Wraps a single-poll [`SnowflakeGenerator`] and turns its statuses into a
/// blocking call:
///
/// - Sequence exhausted for the current millisecond: spin/yield until the
///   clock ticks. Callers see latency, not an error, bounded by
///   [`GeneratorOptions::max_wait`].
/// - Clock behind the last issued timestamp: apply the configured
///   [`ClockDriftPolicy`].
///
/// Errors are returned to the caller, never logged or swallowed, and a failed
/// or abandoned call never leaves the state half-updated.
///
/// Create one per process (or per logical shard) and share it by reference or
/// [`Arc`]; it is `Send + Sync` whenever the wrapped generator is.
///
/// # Example
///
/// ```
/// use flakeid::IdGenerator;
///
/// let generator = IdGenerator::new(7).unwrap();
/// let a = generator.generate().unwrap();
/// let b = generator.generate().unwrap();
/// assert!(a < b);
/// assert_eq!(a.worker_id(), 7);
/// ```
///
/// [`ClockDriftPolicy`]: crate::ClockDriftPolicy
/// [`Arc`]: std::sync::Arc
#[derive(Debug)]
pub struct IdGenerator<G = AtomicSnowflakeGenerator<SystemClock>> {
    inner: G,
    options: GeneratorOptions,
}

impl IdGenerator {
    /// Creates a lock-free generator over the wall clock with
    /// [`DEFAULT_EPOCH`] and default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerId`] if `worker_id` is not in `0..=1023`.
    /// Treat that as fatal: the process should not start.
    ///
    /// [`DEFAULT_EPOCH`]: crate::DEFAULT_EPOCH
    /// [`Error::InvalidWorkerId`]: crate::Error::InvalidWorkerId
    pub fn new(worker_id: u64) -> Result<Self> {
        let worker_id = WorkerId::new(worker_id)?;
        Ok(Self::with_worker(worker_id))
    }

    /// Like [`Self::new`], resolving the worker ID from `source`.
    ///
    /// # Errors
    ///
    /// Propagates whatever the source fails with.
    pub fn from_source(source: &impl WorkerIdSource) -> Result<Self> {
        Ok(Self::with_worker(source.worker_id()?))
    }

    fn with_worker(worker_id: WorkerId) -> Self {
        Self::with_options(
            AtomicSnowflakeGenerator::new(worker_id, SystemClock::default()),
            GeneratorOptions::default(),
        )
    }
}

impl<G> IdGenerator<G>
where
    G: SnowflakeGenerator,
{
    pub const fn with_options(inner: G, options: GeneratorOptions) -> Self {
        Self { inner, options }
    }

    pub const fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub const fn inner(&self) -> &G {
        &self.inner
    }

    pub fn worker_id(&self) -> WorkerId {
        self.inner.worker_id()
    }

    /// Returns a fresh ID.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockMovedBackward`]: the clock is behind the last issued
    ///   timestamp and the policy is `Fail`, or the drift exceeds the
    ///   tolerated `max_drift`. Retryable.
    /// - [`Error::GenerationTimeout`]: waiting for the clock took longer than
    ///   `max_wait`. Retryable.
    /// - [`Error::TimestampOverflow`], [`Error::LockPoisoned`]: from the
    ///   wrapped generator.
    ///
    /// [`Error::ClockMovedBackward`]: crate::Error::ClockMovedBackward
    /// [`Error::GenerationTimeout`]: crate::Error::GenerationTimeout
    /// [`Error::TimestampOverflow`]: crate::Error::TimestampOverflow
    /// [`Error::LockPoisoned`]: crate::Error::LockPoisoned
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn generate(&self) -> Result<FlakeId> {
        let mut waiter = Waiter::new(self.options);
        loop {
            match waiter.step(self.inner.try_next_id()?)? {
                Step::Done(id) => return Ok(id),
                Step::Retry(Backoff::Spin { .. }) => std::thread::yield_now(),
                Step::Retry(Backoff::Sleep(dur)) => std::thread::sleep(dur),
            }
        }
    }

    /// [`Self::generate`] as a signed integer, ready for a `BIGINT` column.
    ///
    /// # Errors
    ///
    /// Same as [`Self::generate`].
    pub fn generate_i64(&self) -> Result<i64> {
        self.generate().map(|id| id.to_i64())
    }
}
