use std::{io::Write, sync::Arc, thread, time::Duration};

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use flakeid::{
    AtomicSnowflakeGenerator, Error, FlakeId, IdGenerator, LockSnowflakeGenerator, MonotonicClock,
    SnowflakeGenerator, SystemClock, WorkerIdSource,
};
use serde::Serialize;

use super::config::{AppConfig, ClockKind, Command, GeneratorKind, OutputFormat};

/// Attempts per ID before a retryable error is surfaced.
const MAX_ATTEMPTS: usize = 3;

/// Pause before retrying a timed-out generation.
const RETRY_BACKOFF: Duration = Duration::from_millis(1);

pub type DynGenerator = Arc<dyn SnowflakeGenerator + Send + Sync>;

/// Fields of an ID as printed by `decode` and `generate --format json`.
#[derive(Debug, Serialize)]
pub struct DecodedId {
    #[serde(with = "flakeid::as_string")]
    pub id: FlakeId,
    pub timestamp: u64,
    pub unix_ms: Option<u64>,
    pub time: Option<String>,
    pub worker_id: u64,
    pub sequence: u64,
}

impl DecodedId {
    pub fn new(id: FlakeId, epoch: Duration) -> Self {
        let unix_ms = id.unix_millis(epoch);
        let time = unix_ms
            .and_then(|ms| i64::try_from(ms).ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
        Self {
            id,
            timestamp: id.timestamp(),
            unix_ms,
            time,
            worker_id: id.worker_id(),
            sequence: id.sequence(),
        }
    }
}

pub fn run(config: &AppConfig, out: &mut impl Write) -> anyhow::Result<()> {
    match &config.command {
        Command::Generate { count, format } => {
            let generator = build_generator(config)?;
            generate(&generator, *count, *format, config.epoch, out)
        }
        Command::Decode { id } => decode(id, config.epoch, out),
    }
}

/// Resolves the worker ID and wires up the configured generator and clock.
///
/// Every failure here is fatal: a process that cannot prove its worker ID
/// must not mint IDs.
pub fn build_generator(config: &AppConfig) -> anyhow::Result<IdGenerator<DynGenerator>> {
    let source = config
        .worker_source
        .as_ref()
        .context("no worker id source configured")?;
    let worker = source
        .worker_id()
        .with_context(|| format!("failed to resolve worker id from {source:?}"))?;

    let inner: DynGenerator = match (config.generator, config.clock) {
        (GeneratorKind::Atomic, ClockKind::System) => Arc::new(AtomicSnowflakeGenerator::new(
            worker,
            SystemClock::try_with_epoch(config.epoch)?,
        )),
        (GeneratorKind::Atomic, ClockKind::Monotonic) => Arc::new(AtomicSnowflakeGenerator::new(
            worker,
            MonotonicClock::try_with_epoch(config.epoch)?,
        )),
        (GeneratorKind::Lock, ClockKind::System) => Arc::new(LockSnowflakeGenerator::new(
            worker,
            SystemClock::try_with_epoch(config.epoch)?,
        )),
        (GeneratorKind::Lock, ClockKind::Monotonic) => Arc::new(LockSnowflakeGenerator::new(
            worker,
            MonotonicClock::try_with_epoch(config.epoch)?,
        )),
    };

    tracing::info!(
        worker_id = %worker,
        generator = ?config.generator,
        clock = ?config.clock,
        "generator ready"
    );

    Ok(IdGenerator::with_options(inner, config.options))
}

pub fn generate<G>(
    generator: &IdGenerator<G>,
    count: usize,
    format: OutputFormat,
    epoch: Duration,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    G: SnowflakeGenerator,
{
    for _ in 0..count {
        let id = generate_with_retry(generator)?;
        match format {
            OutputFormat::Decimal => writeln!(out, "{id}")?,
            OutputFormat::Padded => writeln!(out, "{}", id.to_padded_string())?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, &DecodedId::new(id, epoch))?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    tracing::debug!(count, "generated ids");
    Ok(())
}

fn generate_with_retry<G>(generator: &IdGenerator<G>) -> anyhow::Result<FlakeId>
where
    G: SnowflakeGenerator,
{
    let mut attempt = 1;
    loop {
        match generator.generate() {
            Ok(id) => return Ok(id),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                let backoff = retry_backoff(&err);
                tracing::warn!(%err, attempt, ?backoff, "retrying id generation");
                thread::sleep(backoff);
                attempt += 1;
            }
            Err(err) => return Err(err).context("failed to generate id"),
        }
    }
}

/// A backward clock needs at least `drift_ms` to catch up.
fn retry_backoff(err: &Error) -> Duration {
    match err {
        Error::ClockMovedBackward { drift_ms } => Duration::from_millis(*drift_ms),
        _ => RETRY_BACKOFF,
    }
}

pub fn decode(raw: &str, epoch: Duration, out: &mut impl Write) -> anyhow::Result<()> {
    let id: FlakeId = raw
        .parse()
        .with_context(|| format!("{raw:?} is not a valid id"))?;
    serde_json::to_writer_pretty(&mut *out, &DecodedId::new(id, epoch))?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    use flakeid::{DEFAULT_EPOCH, GeneratorOptions, TimeSource, WorkerId};
    use serde_json::Value;

    use super::*;
    use crate::cli::config::WorkerSource;

    fn config(command: Command, generator: GeneratorKind, clock: ClockKind) -> AppConfig {
        AppConfig {
            command,
            worker_source: Some(WorkerSource::Static(WorkerId::new(7).unwrap())),
            epoch: DEFAULT_EPOCH,
            options: GeneratorOptions::default(),
            generator,
            clock,
        }
    }

    fn run_to_string(config: &AppConfig) -> String {
        let mut out = Vec::new();
        run(config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn generates_increasing_decimal_ids() {
        for generator in [GeneratorKind::Atomic, GeneratorKind::Lock] {
            for clock in [ClockKind::System, ClockKind::Monotonic] {
                let command = Command::Generate {
                    count: 100,
                    format: OutputFormat::Decimal,
                };
                let output = run_to_string(&config(command, generator, clock));
                let ids: Vec<FlakeId> = output.lines().map(|l| l.parse().unwrap()).collect();
                assert_eq!(ids.len(), 100);
                assert!(ids.windows(2).all(|w| w[0] < w[1]));
                assert!(ids.iter().all(|id| id.worker_id() == 7));
            }
        }
    }

    #[test]
    fn padded_ids_are_twenty_digits() {
        let command = Command::Generate {
            count: 3,
            format: OutputFormat::Padded,
        };
        let output = run_to_string(&config(command, GeneratorKind::Atomic, ClockKind::System));
        assert!(output.lines().all(|l| l.len() == 20));
    }

    #[test]
    fn json_lines_carry_the_fields() {
        let command = Command::Generate {
            count: 2,
            format: OutputFormat::Json,
        };
        let output = run_to_string(&config(command, GeneratorKind::Lock, ClockKind::System));
        for line in output.lines() {
            let value: Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["worker_id"], 7);
            assert!(value["id"].is_string());
        }
    }

    #[test]
    fn decodes_known_id() {
        let id = FlakeId::from_parts(1000, 7, 3);
        let command = Command::Decode { id: id.to_string() };
        let output = run_to_string(&config(command, GeneratorKind::Atomic, ClockKind::System));
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["timestamp"], 1000);
        assert_eq!(value["unix_ms"], 1_577_836_801_000_u64);
        assert_eq!(value["time"], "2020-01-01T00:00:01.000Z");
        assert_eq!(value["worker_id"], 7);
        assert_eq!(value["sequence"], 3);
    }

    #[test]
    fn decode_survives_an_epoch_near_u64_max() {
        let id = FlakeId::from_parts(1000, 1, 0);
        let mut out = Vec::new();
        decode(&id.to_string(), Duration::from_millis(u64::MAX - 10), &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["timestamp"], 1000);
        assert!(value["unix_ms"].is_null());
        assert!(value["time"].is_null());
    }

    /// Replays `values`, repeating the last one once exhausted.
    struct ScriptedClock {
        values: Vec<u64>,
        index: AtomicUsize,
    }

    impl TimeSource for ScriptedClock {
        fn current_millis(&self) -> u64 {
            let i = self.index.fetch_add(1, Ordering::SeqCst);
            self.values[i.min(self.values.len() - 1)]
        }
    }

    #[test]
    fn backward_clock_is_retried_after_the_drift() {
        let clock = ScriptedClock {
            values: vec![100, 95, 101],
            index: AtomicUsize::new(0),
        };
        let generator = IdGenerator::with_options(
            LockSnowflakeGenerator::new(WorkerId::new(7).unwrap(), clock),
            GeneratorOptions::default(),
        );
        assert_eq!(generate_with_retry(&generator).unwrap().timestamp(), 100);

        let start = Instant::now();
        let id = generate_with_retry(&generator).unwrap();
        assert_eq!(id.timestamp(), 101);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn backoff_matches_the_error() {
        assert_eq!(
            retry_backoff(&Error::ClockMovedBackward { drift_ms: 5 }),
            Duration::from_millis(5)
        );
        assert_eq!(
            retry_backoff(&Error::GenerationTimeout {
                waited: Duration::from_millis(50)
            }),
            RETRY_BACKOFF
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut out = Vec::new();
        assert!(decode("not-an-id", DEFAULT_EPOCH, &mut out).is_err());
        assert!(decode("18446744073709551615", DEFAULT_EPOCH, &mut out).is_err());
    }

    #[test]
    fn missing_worker_is_fatal() {
        let mut config = config(
            Command::Generate {
                count: 1,
                format: OutputFormat::Decimal,
            },
            GeneratorKind::Atomic,
            ClockKind::System,
        );
        config.worker_source = None;
        assert!(build_generator(&config).is_err());
    }
}
