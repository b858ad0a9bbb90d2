//! Worker IDs and the ways a process learns its own.
//!
//! Every running generator must hold a worker ID that no other concurrently
//! running generator sharing the same epoch holds. The generator cannot
//! detect a duplicate; uniqueness is an operational contract owned by
//! whatever deploys the process. [`WorkerIdSource`] is the seam where that
//! contract is plugged in: a fixed value from configuration, an environment
//! variable, or an orchestrator-assigned ordinal.

use core::{fmt, str::FromStr};

use crate::{Error, FlakeId, Result};

/// Environment variable read by [`EnvWorkerId::default`].
pub const WORKER_ID_ENV: &str = "WORKER_ID";

/// A validated worker ID in `0..=1023`.
///
/// # Example
///
/// ```
/// use flakeid::{Error, WorkerId};
///
/// assert!(WorkerId::new(0).is_ok());
/// assert!(WorkerId::new(1023).is_ok());
/// assert!(matches!(WorkerId::new(1024), Err(Error::InvalidWorkerId { .. })));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WorkerId(u16);

impl WorkerId {
    /// The largest worker ID that fits the 10-bit field.
    pub const MAX: u64 = FlakeId::WORKER_ID_MASK;

    /// Validates `value` against the 10-bit worker field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerId`] if `value > 1023`.
    pub const fn new(value: u64) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::InvalidWorkerId {
                value,
                max: Self::MAX,
            });
        }
        Ok(Self(value as u16))
    }

    pub(crate) const fn from_masked(value: u64) -> Self {
        Self((value & Self::MAX) as u16)
    }

    pub const fn get(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for WorkerId {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<WorkerId> for u64 {
    fn from(worker: WorkerId) -> Self {
        worker.get()
    }
}

impl FromStr for WorkerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: u64 = s.trim().parse().map_err(|e| Error::WorkerIdUnavailable {
            reason: format!("{s:?} is not a worker id: {e}"),
        })?;
        Self::new(value)
    }
}

/// Somewhere a process can learn its worker ID from.
///
/// Resolved once at startup; a failure here should stop the process.
pub trait WorkerIdSource {
    /// Resolves and validates the worker ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerIdUnavailable`] if the source has no answer, or
    /// [`Error::InvalidWorkerId`] if the answer is out of range.
    fn worker_id(&self) -> Result<WorkerId>;
}

/// A fixed, manually configured worker ID.
impl WorkerIdSource for WorkerId {
    fn worker_id(&self) -> Result<WorkerId> {
        Ok(*self)
    }
}

impl<S: WorkerIdSource + ?Sized> WorkerIdSource for &S {
    fn worker_id(&self) -> Result<WorkerId> {
        (**self).worker_id()
    }
}

impl<S: WorkerIdSource + ?Sized> WorkerIdSource for Box<S> {
    fn worker_id(&self) -> Result<WorkerId> {
        (**self).worker_id()
    }
}

/// Reads the worker ID from an environment variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvWorkerId {
    var: String,
}

impl EnvWorkerId {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvWorkerId {
    /// Reads [`WORKER_ID_ENV`].
    fn default() -> Self {
        Self::new(WORKER_ID_ENV)
    }
}

impl WorkerIdSource for EnvWorkerId {
    fn worker_id(&self) -> Result<WorkerId> {
        let raw = std::env::var(&self.var).map_err(|e| Error::WorkerIdUnavailable {
            reason: format!("{}: {e}", self.var),
        })?;
        raw.parse()
    }
}

/// Derives the worker ID from an orchestrator-assigned ordinal.
///
/// StatefulSet-style deployments name their replicas `<name>-<ordinal>`
/// (`order-service-0`, `order-service-1`, ...). The ordinal after the last
/// `-` plus `offset` becomes the worker ID. Use distinct offsets for
/// services that share an epoch so their ranges do not overlap.
///
/// # Example
///
/// ```
/// use flakeid::{OrdinalWorkerId, WorkerIdSource};
///
/// let source = OrdinalWorkerId::new("review-service-3").with_offset(100);
/// assert_eq!(source.worker_id().unwrap().get(), 103);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrdinalWorkerId {
    hostname: String,
    offset: u64,
}

impl OrdinalWorkerId {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            offset: 0,
        }
    }

    /// Uses the `HOSTNAME` environment variable, which container runtimes set
    /// to the pod name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerIdUnavailable`] if `HOSTNAME` is unset.
    pub fn from_env() -> Result<Self> {
        std::env::var("HOSTNAME")
            .map(Self::new)
            .map_err(|e| Error::WorkerIdUnavailable {
                reason: format!("HOSTNAME: {e}"),
            })
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn ordinal(&self) -> Option<u64> {
        let (_, suffix) = self.hostname.rsplit_once('-')?;
        suffix.parse().ok()
    }
}

impl WorkerIdSource for OrdinalWorkerId {
    fn worker_id(&self) -> Result<WorkerId> {
        let ordinal = self.ordinal().ok_or_else(|| Error::WorkerIdUnavailable {
            reason: format!("hostname {:?} has no trailing ordinal", self.hostname),
        })?;
        let value = ordinal
            .checked_add(self.offset)
            .ok_or_else(|| Error::WorkerIdUnavailable {
                reason: format!("ordinal {ordinal} plus offset {} overflows u64", self.offset),
            })?;
        WorkerId::new(value)
    }
}
