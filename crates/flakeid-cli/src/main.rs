#![doc = include_str!("../README.md")]

mod cli;

use std::io;

use clap::Parser;
use cli::commands::run;
use cli::config::{AppConfig, CliArgs};
use cli::telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    if let Err(err) = run(&config, &mut out) {
        tracing::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Starting flakeid with full config: {:#?}", config);
    } else {
        tracing::debug!(
            "Starting flakeid with {:?} generator on {:?} clock",
            config.generator,
            config.clock
        );
    }
}
