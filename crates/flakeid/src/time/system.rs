use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{DEFAULT_EPOCH, Error, Result, TimeSource};

/// A wall-clock time source offset from a fixed epoch.
///
/// Every read is a `SystemTime::now()` call, so this clock follows NTP
/// corrections and VM migrations, including steps backward. Generators detect
/// those steps and apply their [`ClockDriftPolicy`].
///
/// A reading earlier than the epoch is clamped to zero.
///
/// [`ClockDriftPolicy`]: crate::ClockDriftPolicy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemClock {
    epoch_ms: u64,
}

impl Default for SystemClock {
    /// Constructs a wall clock aligned to [`DEFAULT_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(DEFAULT_EPOCH)
    }
}

impl SystemClock {
    /// Constructs a wall clock using `epoch` (a [`Duration`] since 1970-01-01
    /// UTC) as t = 0.
    pub const fn with_epoch(epoch: Duration) -> Self {
        Self {
            epoch_ms: epoch.as_millis() as u64,
        }
    }

    /// Like [`Self::with_epoch`], but refuses an epoch in the future.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockBeforeEpoch`] if the wall clock currently reads
    /// earlier than `epoch`.
    pub fn try_with_epoch(epoch: Duration) -> Result<Self> {
        let clock = Self::with_epoch(epoch);
        if unix_millis() < clock.epoch_ms {
            return Err(Error::ClockBeforeEpoch);
        }
        Ok(clock)
    }

    pub const fn epoch(&self) -> Duration {
        Duration::from_millis(self.epoch_ms)
    }
}

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        unix_millis().saturating_sub(self.epoch_ms)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
