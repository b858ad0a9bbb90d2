use core::{future::Future, time::Duration};

use crate::{FlakeId, IdGenerator, Result, SnowflakeGenerator, futures::SleepProvider};

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider for use in async applications built on Tokio.
pub struct TokioSleep;

impl SleepProvider for TokioSleep {
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}

/// An implementation of [`SleepProvider`] using Tokio's yield.
///
/// This strategy avoids timer-based delays by yielding to the scheduler
/// immediately, which can improve responsiveness in low-concurrency scenarios.
///
/// However, it comes at the cost of more frequent rescheduling, which can
/// result in tighter polling loops and increased CPU usage under load. In
/// highly concurrent cases, a timer-based sleep (e.g., [`TokioSleep`]) is often
/// more efficient due to reduced scheduler churn.
pub struct TokioYield;

impl SleepProvider for TokioYield {
    fn sleep_for(_dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::task::yield_now()
    }
}

impl<G> IdGenerator<G>
where
    G: SnowflakeGenerator + Sync,
{
    /// [`IdGenerator::generate_async`] with [`TokioSleep`].
    ///
    /// # Errors
    ///
    /// Same as [`IdGenerator::generate`].
    pub async fn generate_tokio(&self) -> Result<FlakeId> {
        self.generate_async::<TokioSleep>().await
    }
}
