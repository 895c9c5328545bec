//! Privilege-dropping PostgreSQL helper for the embedded test cluster.
//!
//! `pg-embed-setup-unpriv` re-executes this binary when integration tests run
//! as root. It receives an operation and the path of a JSON
//! [`WorkerPayload`], rebuilds the PostgreSQL settings, and drives one
//! lifecycle step of `postgresql_embedded` on a current-thread runtime.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Report, Result};
use pg_embedded_setup_unpriv::worker::WorkerPayload;
use postgresql_embedded::PostgreSQL;
use tokio::runtime::Builder;

#[derive(Debug, Parser)]
#[command(name = "pg-worker", about = "Embedded PostgreSQL lifecycle helper")]
struct WorkerArgs {
    /// Lifecycle step to run.
    #[arg(value_enum)]
    operation: Operation,
    /// JSON payload written by the test cluster bootstrap.
    config: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Operation {
    Setup,
    Start,
    Stop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Start => "start",
            Self::Stop => "stop",
        })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    run(std::env::args_os())
}

fn run(args: impl IntoIterator<Item = OsString>) -> Result<()> {
    let args = WorkerArgs::try_parse_from(args)?;
    let payload = read_payload(&args.config)?;
    execute(args.operation, payload)
}

fn read_payload(path: &Path) -> Result<WorkerPayload> {
    let raw = fs::read(path).with_context(|| format!("failed to read worker payload {path:?}"))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse worker payload {path:?}"))
}

fn execute(operation: Operation, payload: WorkerPayload) -> Result<()> {
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| Report::new(err).wrap_err("failed to rebuild postgres settings"))?;
    for (key, value) in payload.environment {
        // SAFETY: single-threaded at this point; the runtime is built below.
        match value {
            Some(value) => unsafe { std::env::set_var(&key, value.expose()) },
            None => unsafe { std::env::remove_var(&key) },
        }
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build pg-worker runtime")?;
    let mut postgres = PostgreSQL::new(settings);
    runtime
        .block_on(async move {
            match operation {
                Operation::Setup => postgres.setup().await,
                Operation::Start => postgres.start().await,
                Operation::Stop => postgres.stop().await,
            }
        })
        .with_context(|| format!("postgres {operation} failed"))
}
