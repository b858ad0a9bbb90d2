use core::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use flakeid::{
    ClockDriftPolicy, DEFAULT_EPOCH, EnvWorkerId, FlakeId, GeneratorOptions, OrdinalWorkerId, WorkerId,
    WorkerIdSource,
};

/// Runtime configuration for the `flakeid` binary.
///
/// Every global option can also come from the environment (or a `.env` file),
/// which is how the services' deployment manifests set them.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flakeid",
    version,
    about = "Mint and decode 64-bit Snowflake-style IDs"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Worker ID for the `static` source, in `0..=1023`.
    ///
    /// Environment variable: `WORKER_ID`
    #[arg(long, env = "WORKER_ID", global = true)]
    pub worker_id: Option<u64>,

    /// Where the worker ID comes from.
    ///
    /// `static` uses `--worker-id`, `env` reads the `WORKER_ID` variable at
    /// startup, `ordinal` takes the trailing `-N` of `--hostname` plus
    /// `--ordinal-offset`.
    ///
    /// Environment variable: `WORKER_ID_SOURCE`
    #[arg(long, env = "WORKER_ID_SOURCE", value_enum, default_value_t = WorkerSourceKind::Static, global = true)]
    pub worker_id_source: WorkerSourceKind,

    /// Pod or host name for the `ordinal` source, e.g. `order-service-3`.
    ///
    /// Environment variable: `HOSTNAME`
    #[arg(long, env = "HOSTNAME", global = true)]
    pub hostname: Option<String>,

    /// Added to the ordinal so services sharing an epoch get disjoint ranges.
    ///
    /// Environment variable: `ORDINAL_OFFSET`
    #[arg(long, env = "ORDINAL_OFFSET", default_value_t = 0, global = true)]
    pub ordinal_offset: u64,

    /// Epoch in Unix milliseconds. Every service sharing IDs must agree on it.
    ///
    /// Environment variable: `EPOCH_MS`
    #[arg(long, env = "EPOCH_MS", default_value_t = DEFAULT_EPOCH.as_millis() as u64, global = true)]
    pub epoch_ms: u64,

    /// What to do when the clock moves backward.
    ///
    /// Environment variable: `CLOCK_DRIFT_POLICY`
    #[arg(long, env = "CLOCK_DRIFT_POLICY", value_enum, default_value_t = DriftPolicyKind::Fail, global = true)]
    pub drift_policy: DriftPolicyKind,

    /// Largest backward step to wait out under `--drift-policy wait`.
    ///
    /// Environment variable: `MAX_DRIFT_MS`
    #[arg(long, env = "MAX_DRIFT_MS", default_value_t = 10, global = true)]
    pub max_drift_ms: u64,

    /// Ceiling on the time a single `generate` may spend waiting for the clock.
    ///
    /// Environment variable: `MAX_WAIT_MS`
    #[arg(long, env = "MAX_WAIT_MS", default_value_t = GeneratorOptions::DEFAULT_MAX_WAIT.as_millis() as u64, global = true)]
    pub max_wait_ms: u64,

    /// Generator implementation.
    ///
    /// Environment variable: `GENERATOR`
    #[arg(long, env = "GENERATOR", value_enum, default_value_t = GeneratorKind::Atomic, global = true)]
    pub generator: GeneratorKind,

    /// Clock implementation.
    ///
    /// Environment variable: `CLOCK`
    #[arg(long, env = "CLOCK", value_enum, default_value_t = ClockKind::System, global = true)]
    pub clock: ClockKind,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mint new IDs, one per line.
    Generate {
        /// How many IDs to mint.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Decimal)]
        format: OutputFormat,
    },
    /// Break an existing ID into its fields.
    Decode {
        /// The ID, in decimal.
        id: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain decimal.
    Decimal,
    /// 20-digit zero-padded decimal, sorts lexicographically.
    Padded,
    /// One JSON object per line with the decoded fields.
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSourceKind {
    Static,
    Env,
    Ordinal,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftPolicyKind {
    Fail,
    Wait,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Atomic,
    Lock,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    System,
    Monotonic,
}

/// A resolved choice of [`WorkerIdSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSource {
    Static(WorkerId),
    Env(EnvWorkerId),
    Ordinal(OrdinalWorkerId),
}

impl WorkerIdSource for WorkerSource {
    fn worker_id(&self) -> flakeid::Result<WorkerId> {
        match self {
            Self::Static(worker) => worker.worker_id(),
            Self::Env(source) => source.worker_id(),
            Self::Ordinal(source) => source.worker_id(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub command: Command,
    pub worker_source: Option<WorkerSource>,
    pub epoch: Duration,
    pub options: GeneratorOptions,
    pub generator: GeneratorKind,
    pub clock: ClockKind,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let worker_source = match args.worker_id_source {
            WorkerSourceKind::Static => args
                .worker_id
                .map(WorkerId::new)
                .transpose()?
                .map(WorkerSource::Static),
            WorkerSourceKind::Env => Some(WorkerSource::Env(EnvWorkerId::default())),
            WorkerSourceKind::Ordinal => args.hostname.map(|hostname| {
                WorkerSource::Ordinal(OrdinalWorkerId::new(hostname).with_offset(args.ordinal_offset))
            }),
        };

        // Decoding never touches a generator.
        if worker_source.is_none() && matches!(args.command, Command::Generate { .. }) {
            match args.worker_id_source {
                WorkerSourceKind::Ordinal => {
                    bail!("HOSTNAME must be set when WORKER_ID_SOURCE is `ordinal`")
                }
                _ => bail!("WORKER_ID must be set when WORKER_ID_SOURCE is `static`"),
            }
        }

        if args.epoch_ms.checked_add(FlakeId::max_timestamp()).is_none() {
            bail!(
                "EPOCH_MS {} leaves no room for the 41-bit timestamp range",
                args.epoch_ms
            );
        }

        if args.max_wait_ms == 0 {
            bail!("MAX_WAIT_MS must be greater than 0");
        }

        let drift_policy = match args.drift_policy {
            DriftPolicyKind::Fail => ClockDriftPolicy::Fail,
            DriftPolicyKind::Wait => ClockDriftPolicy::Wait {
                max_drift: Duration::from_millis(args.max_drift_ms),
            },
        };

        let options = GeneratorOptions::default()
            .with_drift_policy(drift_policy)
            .with_max_wait(Duration::from_millis(args.max_wait_ms));

        Ok(Self {
            command: args.command,
            worker_source,
            epoch: Duration::from_millis(args.epoch_ms),
            options,
            generator: args.generator,
            clock: args.clock,
        })
    }
}
