use core::{future::Future, time::Duration};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    FlakeId, IdGenerator, Result, SnowflakeGenerator,
    generator::{Backoff, Step, Waiter},
};

/// A trait that abstracts over how to sleep for a given [`Duration`] in async
/// contexts.
///
/// This keeps [`IdGenerator::generate_async`] independent of the runtime that
/// drives it.
pub trait SleepProvider {
    /// We require `Send` so that the future can be safely moved across threads
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;
}

impl<G> IdGenerator<G>
where
    G: SnowflakeGenerator + Sync,
{
    /// Async counterpart of [`IdGenerator::generate`].
    ///
    /// Waits through `S` instead of blocking the thread. The same
    /// [`GeneratorOptions`] apply: drift is handled per the configured policy
    /// and the total wait is bounded by `max_wait`.
    ///
    /// # Errors
    ///
    /// Same as [`IdGenerator::generate`].
    ///
    /// [`GeneratorOptions`]: crate::GeneratorOptions
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn generate_async<S>(&self) -> Result<FlakeId>
    where
        S: SleepProvider,
    {
        let mut waiter = Waiter::new(*self.options());
        loop {
            let dur = match waiter.step(self.inner().try_next_id()?)? {
                Step::Done(id) => return Ok(id),
                Step::Retry(Backoff::Spin { yield_for }) => yield_for,
                Step::Retry(Backoff::Sleep(dur)) => dur,
            };
            S::sleep_for(dur).await;
        }
    }
}
