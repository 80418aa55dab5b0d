//! Argument surface of the `bulkload-bench` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    config::{BenchConfig, ConfigError},
    error::{ErrorCategory, RunError},
    report::{self, BenchResult, BenchResultWriter},
    runner::{BenchmarkRunner, RunMode},
    store::{memory::MemoryConnector, scylla::ScyllaConnector, BatchKind, Connector},
};

/// Exit status of a successful run.
pub const EXIT_OK: u8 = 0;
/// Exit status for invalid configuration.
pub const EXIT_CONFIG: u8 = 2;
/// Exit status for a mode that has no implementation.
pub const EXIT_UNIMPLEMENTED: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "bulkload-bench")]
#[command(about = "Parallel bulk-load benchmark for wide-column CQL stores")]
/// Command-line arguments.
pub struct Args {
    /// Test type.
    #[arg(value_enum)]
    pub mode: RunMode,
    /// Number of data rows [default: 1000000].
    #[arg(long)]
    pub row_count: Option<usize>,
    /// Address of the store [default: 127.0.0.1].
    #[arg(long)]
    pub db: Option<String>,
    /// Port of the store [default: 9042].
    #[arg(long)]
    pub db_port: Option<u16>,
    /// Number of threads writing in parallel [default: 1].
    #[arg(long)]
    pub threads: Option<usize>,
    /// Path to the data file for the `fromfile` test.
    #[arg(long, required_if_eq("mode", "fromfile"))]
    pub data_list_file: Option<PathBuf>,
    /// YAML config file; flags given on the command line take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Execution timeout of each shard batch, in seconds [default: 120].
    #[arg(long)]
    pub batch_timeout_secs: Option<u64>,
    /// Batch mode used by the writers [default: unlogged].
    #[arg(long, value_enum)]
    pub batch_kind: Option<BatchKind>,
    /// Seed for key generation.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Store implementation to run against.
    #[arg(long, value_enum, default_value = "scylla")]
    pub backend: Backend,
    /// Write a JSON result file into this directory.
    #[arg(long)]
    pub report_json: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short)]
    pub verbose: bool,
}

/// Store implementations selectable from the command line.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum Backend {
    /// CQL cluster through the scylla driver.
    Scylla,
    /// In-process store; nothing leaves the machine.
    Memory,
}

impl Args {
    /// Merge the optional config file with the flags on the command line.
    pub fn resolve_config(&self) -> Result<BenchConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => BenchConfig::from_yaml_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(rows) = self.row_count {
            cfg.row_count = rows;
        }
        if let Some(host) = &self.db {
            cfg.host = host.clone();
        }
        if let Some(port) = self.db_port {
            cfg.port = port;
        }
        if let Some(threads) = self.threads {
            cfg.threads = threads;
        }
        if let Some(secs) = self.batch_timeout_secs {
            cfg.batch_timeout_secs = secs;
        }
        if let Some(kind) = self.batch_kind {
            cfg.batch_kind = kind;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Process exit status for a failure category.
pub fn exit_code(category: ErrorCategory) -> u8 {
    match category {
        ErrorCategory::ConnectionUnavailable => 10,
        ErrorCategory::AuthenticationFailed => 11,
        ErrorCategory::OperationTimeout => 12,
        ErrorCategory::InvalidRequest => 13,
        ErrorCategory::Unauthorized => 14,
        ErrorCategory::Unclassified => 15,
        ErrorCategory::WorkerPanicked => 16,
    }
}

/// Process exit status for a failed run.
pub fn run_error_exit_code(err: &RunError) -> u8 {
    match err {
        RunError::Config(_) => EXIT_CONFIG,
        RunError::Unimplemented(_) => EXIT_UNIMPLEMENTED,
        _ => err.category().map_or(exit_code(ErrorCategory::Unclassified), exit_code),
    }
}

/// Run the benchmark described by `args`, print its outcome and return the
/// process exit status.
pub fn run(args: &Args) -> u8 {
    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            return EXIT_CONFIG;
        }
    };

    for line in preamble(args, &config) {
        println!("{line}");
    }

    match args.backend {
        Backend::Scylla => run_with(args, config, ScyllaConnector::default()),
        Backend::Memory => run_with(args, config, MemoryConnector::default()),
    }
}

/// Lines announcing the run, before any connection is attempted.
fn preamble(args: &Args, config: &BenchConfig) -> Vec<String> {
    match args.mode {
        RunMode::Random => vec![
            format!("Running a 'random' test with {} rows", config.row_count),
            format!("Connecting to {}...", config.endpoint()),
        ],
        RunMode::FromFile => vec![format!(
            "Running the 'fromfile' test with file {}",
            args.data_list_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )],
    }
}

fn run_with<C: Connector>(args: &Args, config: BenchConfig, connector: C) -> u8 {
    let endpoint = config.endpoint().to_string();
    let mut runner = BenchmarkRunner::new(config, connector);
    let outcome = runner.run(args.mode);
    if let Some(err) = runner.cleanup_error() {
        eprintln!("Cleanup incomplete: {}", err.diagnostic(&endpoint));
    }

    match outcome {
        Ok(report) => {
            println!("{}", report::shard_table(&report.outcomes, &report.summary));
            println!("{}", report::summary_line(&report.summary));
            if let Some(dir) = &args.report_json {
                let result =
                    BenchResult::new(report::new_run_id(), args.mode, runner.config(), &report);
                match BenchResultWriter::new(dir)
                    .map_err(anyhow::Error::from)
                    .and_then(|writer| writer.write(&result))
                {
                    Ok(path) => println!("Wrote report to {}", path.display()),
                    Err(err) => eprintln!("Failed to write report: {err:#}"),
                }
            }
            EXIT_OK
        }
        Err(err) => {
            match &err {
                RunError::Store(store_err) => eprintln!("{}", store_err.diagnostic(&endpoint)),
                RunError::Workers { outcomes, partial } => {
                    println!("{}", report::shard_table(outcomes, partial));
                    for failure in err.worker_failures() {
                        eprintln!("{}", failure.diagnostic(&endpoint));
                    }
                    eprintln!("{err}");
                }
                RunError::Config(_) | RunError::Unimplemented(_) => eprintln!("{err}"),
            }
            run_error_exit_code(&err)
        }
    }
}
