use core::time::Duration;
use std::time::Instant;

use crate::{Error, FlakeId, IdGenStatus, Result};

/// What [`IdGenerator::generate`] does when the clock reads earlier than the
/// last issued timestamp.
///
/// Reusing the stale timestamp could repeat a `(timestamp, sequence)` pair,
/// so neither policy ever does that.
///
/// [`IdGenerator::generate`]: crate::IdGenerator::generate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClockDriftPolicy {
    /// Fail immediately with [`Error::ClockMovedBackward`].
    #[default]
    Fail,
    /// Block until the clock catches up, provided the drift is at most
    /// `max_drift`. Larger drifts fail with [`Error::ClockMovedBackward`]
    /// rather than stall the caller.
    Wait {
        /// Largest drift worth waiting out.
        max_drift: Duration,
    },
}

/// Tuning for [`IdGenerator`].
///
/// [`IdGenerator`]: crate::IdGenerator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Reaction to a clock that moved backward.
    pub drift_policy: ClockDriftPolicy,
    /// Ceiling on the total time a single call may spend waiting for the
    /// clock, whether for a new millisecond after sequence exhaustion or for a
    /// tolerated drift to pass. Exceeding it fails the call with
    /// [`Error::GenerationTimeout`].
    pub max_wait: Duration,
}

impl GeneratorOptions {
    pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(50);

    #[must_use]
    pub const fn with_drift_policy(mut self, drift_policy: ClockDriftPolicy) -> Self {
        self.drift_policy = drift_policy;
        self
    }

    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            drift_policy: ClockDriftPolicy::Fail,
            max_wait: Self::DEFAULT_MAX_WAIT,
        }
    }
}

/// How a caller should back off before polling again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Backoff {
    /// The millisecond is exhausted; the next one is at most `yield_for` away.
    Spin { yield_for: Duration },
    /// The clock is behind; sleep this long before polling again.
    Sleep(Duration),
}

/// Outcome of feeding one poll result to a [`Waiter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Done(FlakeId),
    Retry(Backoff),
}

/// Per-call bookkeeping shared by the blocking and async generate loops.
///
/// The clock for the `max_wait` budget starts on the first poll that does not
/// return an ID, so the hot path never reads [`Instant`].
#[derive(Debug)]
pub(crate) struct Waiter {
    options: GeneratorOptions,
    started: Option<Instant>,
}

impl Waiter {
    pub(crate) const fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            started: None,
        }
    }

    pub(crate) fn step(&mut self, status: IdGenStatus) -> Result<Step> {
        match status {
            IdGenStatus::Ready { id } => Ok(Step::Done(id)),
            IdGenStatus::Pending { yield_for } => {
                self.remaining()?;
                Ok(Step::Retry(Backoff::Spin {
                    yield_for: Duration::from_millis(yield_for),
                }))
            }
            IdGenStatus::ClockBehind { drift } => self.cold_clock_behind(drift),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(&mut self, drift: u64) -> Result<Step> {
        match self.options.drift_policy {
            ClockDriftPolicy::Fail => Err(Error::ClockMovedBackward { drift_ms: drift }),
            ClockDriftPolicy::Wait { max_drift } => {
                let drift_for = Duration::from_millis(drift);
                if drift_for > max_drift {
                    return Err(Error::ClockMovedBackward { drift_ms: drift });
                }
                let remaining = self.remaining()?;
                #[cfg(feature = "tracing")]
                tracing::trace!(drift_ms = drift, "clock behind, waiting for it to catch up");
                Ok(Step::Retry(Backoff::Sleep(drift_for.min(remaining))))
            }
        }
    }

    /// Time left in the wait budget, or a timeout once it is spent.
    fn remaining(&mut self) -> Result<Duration> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let waited = started.elapsed();
        if waited >= self.options.max_wait {
            return Err(Error::GenerationTimeout { waited });
        }
        Ok(self.options.max_wait - waited)
    }
}
