//! Command-line entry point: load parameters and a cohort, run the
//! simulation, and write the event log to a CSV file or (with the
//! `postgres` feature) a Postgres database.
//!
//! Grounded in `original_source/crcsim/__main__.py::run`'s argument list,
//! adapted to `clap` derive-style parsing the way the teacher's binaries
//! parse their own CLI arguments, with `tracing-subscriber` driving the
//! `--debug` flag instead of Python's `logging.basicConfig`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crcsim::driver::{run_cohort, run_cohort_parallel};
use crcsim::output::{CsvSink, EventSink};
#[cfg(feature = "postgres")]
use crcsim::output::PostgresSink;
use crcsim::params::Parameters;

#[derive(Parser)]
#[command(name = "crcsim", about = "Discrete-event colorectal cancer natural history simulation")]
struct Cli {
    /// Path to the JSON parameter file.
    #[arg(long, default_value = "parameters.json")]
    params: PathBuf,

    /// Path to the cohort CSV file (columns: id, sex, race_ethnicity).
    #[arg(long, default_value = "cohort.csv")]
    cohort: PathBuf,

    /// Path to the output CSV file. Ignored if `--database-url` is given.
    #[arg(long, default_value = "output.csv")]
    outfile: PathBuf,

    /// Postgres connection string. When set, the event log is written to
    /// this database instead of `--outfile`. Requires the `postgres`
    /// feature.
    #[arg(long)]
    database_url: Option<String>,

    /// Base RNG seed for the run.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulate only the first N cohort members. Defaults to the whole
    /// cohort.
    #[arg(long)]
    npeople: Option<usize>,

    /// Number of worker threads. 1 (the default) runs sequentially with a
    /// single shared RNG; values greater than 1 use the reseeded-per-
    /// individual parallel driver.
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Enable debug-level tracing.
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    if let Err(err) = run(cli) {
        tracing::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let params = Parameters::load(&cli.params)?;
    let cohort = crcsim::cohort::read_cohort(&cli.cohort)?;
    let npeople = cli.npeople.unwrap_or(cohort.len());

    if cli.jobs > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.jobs)
            .build_global()
            .expect("thread pool can only be built once per process");
    }

    let mut sink: Box<dyn EventSink> = match &cli.database_url {
        Some(url) => {
            #[cfg(feature = "postgres")]
            {
                Box::new(PostgresSink::connect(url)?)
            }
            #[cfg(not(feature = "postgres"))]
            {
                let _ = url;
                return Err("--database-url requires the `postgres` feature".into());
            }
        }
        None => Box::new(CsvSink::create(&cli.outfile)?),
    };

    if cli.jobs > 1 {
        run_cohort_parallel(&params, &cohort, npeople, cli.seed, sink.as_mut())?;
    } else {
        run_cohort(&params, &cohort, npeople, cli.seed, sink.as_mut())?;
    }

    tracing::info!(npeople, "simulation complete");
    Ok(())
}
