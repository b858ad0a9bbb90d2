use core::time::Duration;
use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use crate::{DEFAULT_EPOCH, Error, Result, TimeSource};

/// Shared ticker thread that updates every millisecond.
#[derive(Debug)]
struct SharedTickerInner {
    current: AtomicU64,
    _handle: OnceLock<JoinHandle<()>>,
}

/// A monotonic time source that returns elapsed time since construction,
/// offset from a fixed epoch.
///
/// The wall clock is consulted exactly once, at construction, to compute the
/// offset between the epoch and now. After that a background thread advances
/// a shared counter from [`Instant`], so readings never go backward even if
/// the system clock is stepped. The trade-off is that the clock does not
/// follow NTP corrections made after startup.
///
/// Clones share the same ticker thread. The thread exits once the last clone
/// is dropped.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    inner: Arc<SharedTickerInner>,
    epoch_offset: u64, // in milliseconds
}

impl Default for MonotonicClock {
    /// Constructs a monotonic clock aligned to [`DEFAULT_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(DEFAULT_EPOCH)
    }
}

impl MonotonicClock {
    /// Constructs a monotonic clock using `epoch` (a [`Duration`] since
    /// 1970-01-01 UTC) as t = 0.
    ///
    /// If the wall clock reads earlier than `epoch`, the clock starts at zero.
    /// Use [`Self::try_with_epoch`] to reject that instead.
    pub fn with_epoch(epoch: Duration) -> Self {
        let offset = system_now().saturating_sub(epoch);
        Self::spawn(offset.as_millis() as u64)
    }

    /// Constructs a monotonic clock using `epoch` as t = 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockBeforeEpoch`] if the wall clock reads earlier
    /// than `epoch`.
    ///
    /// # Example
    ///
    /// ```
    /// use flakeid::{DEFAULT_EPOCH, MonotonicClock, TimeSource};
    ///
    /// let clock = MonotonicClock::try_with_epoch(DEFAULT_EPOCH).unwrap();
    /// let a = clock.current_millis();
    /// std::thread::sleep(std::time::Duration::from_millis(2));
    /// assert!(clock.current_millis() >= a);
    /// ```
    pub fn try_with_epoch(epoch: Duration) -> Result<Self> {
        let offset = system_now()
            .checked_sub(epoch)
            .ok_or(Error::ClockBeforeEpoch)?;
        Ok(Self::spawn(offset.as_millis() as u64))
    }

    fn spawn(epoch_offset: u64) -> Self {
        let start = Instant::now();
        let inner = Arc::new(SharedTickerInner {
            current: AtomicU64::new(0),
            _handle: OnceLock::new(),
        });

        let weak_inner = Arc::downgrade(&inner);
        let handle = thread::spawn(move || {
            let mut tick = 0;

            loop {
                let Some(inner_ref) = weak_inner.upgrade() else {
                    break;
                };

                // Absolute target time of the next tick
                let target = start + Duration::from_millis(tick);

                let now = Instant::now();
                if now < target {
                    thread::sleep(target - now);
                }

                let now_ms = start.elapsed().as_millis() as u64;
                inner_ref.current.store(now_ms, Ordering::Relaxed);

                // Align to next tick after the current actual time
                tick = now_ms + 1;
            }
        });

        // Fresh cell, cannot already be set.
        let _ = inner._handle.set(handle);

        Self {
            inner,
            epoch_offset,
        }
    }
}

impl TimeSource for MonotonicClock {
    /// Returns the number of milliseconds since the configured epoch, based on
    /// the elapsed monotonic time since construction.
    fn current_millis(&self) -> u64 {
        self.epoch_offset + self.inner.current.load(Ordering::Relaxed)
    }
}

fn system_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}
