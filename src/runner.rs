//! Benchmark orchestration.
//!
//! A run walks `Disconnected -> Connected -> SchemaReady -> DataGenerated ->
//! WorkersRunning -> Aggregated -> CleanedUp -> Closed`. Once `Connected` is
//! reached the store handle lives in a [`SessionGuard`], so the keyspace is
//! dropped and the connection closed whether the run succeeds, fails or
//! unwinds.

use std::{fmt, time::Instant};

use crate::{
    config::BenchConfig,
    error::{RunError, StoreError},
    metrics::{RunResult, RunSummary},
    observability::{log_info, log_warn},
    partition::partition,
    row::generate_with_rng,
    schema::{self, SchemaSpec},
    session::SessionGuard,
    store::{Connector, Endpoint, Store},
    worker::{write_shards, ShardOutcome, WriteOptions},
};

/// Source of the benchmark rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Synthetic rows with random keys.
    Random,
    /// Rows listed in a data file. Not implemented.
    #[value(name = "fromfile")]
    FromFile,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Random => f.write_str("random"),
            RunMode::FromFile => f.write_str("fromfile"),
        }
    }
}

/// Lifecycle states of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No connection yet.
    Disconnected,
    /// Connection acquired.
    Connected,
    /// Keyspace and table exist.
    SchemaReady,
    /// Dataset generated.
    DataGenerated,
    /// Workers started.
    WorkersRunning,
    /// All workers joined and results folded.
    Aggregated,
    /// Keyspace dropped (or the attempt failed).
    CleanedUp,
    /// Connection released.
    Closed,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Contact point used.
    pub endpoint: Endpoint,
    /// Cluster name reported by the store.
    pub cluster_name: Option<String>,
    /// Aggregate over all shards.
    pub summary: RunSummary,
    /// One outcome per shard, by shard index.
    pub outcomes: Vec<ShardOutcome>,
    /// Failure of the final keyspace drop or disconnect, if any.
    pub cleanup_error: Option<StoreError>,
}

struct Loaded {
    summary: RunSummary,
    outcomes: Vec<ShardOutcome>,
}

/// Drives one benchmark run against the stores produced by `C`.
pub struct BenchmarkRunner<C: Connector> {
    config: BenchConfig,
    connector: C,
    history: Vec<RunState>,
    cleanup_error: Option<StoreError>,
}

impl<C: Connector> BenchmarkRunner<C> {
    /// Runner for `config` connecting through `connector`.
    pub fn new(config: BenchConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            history: vec![RunState::Disconnected],
            cleanup_error: None,
        }
    }

    /// Configuration of this runner.
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// States visited by the last run, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Failure of the keyspace drop or disconnect in the last run, whether
    /// the run itself succeeded or not.
    pub fn cleanup_error(&self) -> Option<&StoreError> {
        self.cleanup_error.as_ref()
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.history
            .last()
            .copied()
            .unwrap_or(RunState::Disconnected)
    }

    /// Execute one run in `mode`.
    pub fn run(&mut self, mode: RunMode) -> Result<RunReport, RunError> {
        self.history = vec![RunState::Disconnected];
        self.cleanup_error = None;
        self.config.validate()?;
        if mode == RunMode::FromFile {
            return Err(RunError::Unimplemented(mode));
        }

        let endpoint = self.config.endpoint();
        let spec = SchemaSpec::from_config(&self.config);
        log_info!(
            component = "runner",
            event = "run_started",
            mode = %mode,
            rows = self.config.row_count,
            threads = self.config.threads,
            endpoint = %endpoint,
        );

        // Nothing to clean up if the connection never comes up.
        let store = self.connector.connect(&endpoint)?;
        self.enter(RunState::Connected);
        let cluster_name = store.cluster_name();
        if let Some(name) = &cluster_name {
            log_info!(
                component = "runner",
                event = "cluster",
                name = %name,
                "connected to cluster {}",
                name
            );
        }

        let guard = SessionGuard::new(store, spec, self.config.ddl_timeout());
        let loaded = self.load(&guard);

        let cleanup_error = guard.release().err();
        self.enter(RunState::CleanedUp);
        self.enter(RunState::Closed);
        if let Some(err) = &cleanup_error {
            log_warn!(component = "runner", event = "cleanup_incomplete", error = %err);
        }
        self.cleanup_error = cleanup_error.clone();

        let Loaded { summary, outcomes } = loaded?;
        Ok(RunReport {
            endpoint,
            cluster_name,
            summary,
            outcomes,
            cleanup_error,
        })
    }

    fn load(&mut self, guard: &SessionGuard<C::Store>) -> Result<Loaded, RunError> {
        let store = guard.store();
        let spec = guard.schema();
        let ddl_timeout = self.config.ddl_timeout();

        // Leftovers from an aborted run.
        schema::teardown(store, spec, ddl_timeout)?;
        schema::provision(store, spec, ddl_timeout)?;
        self.enter(RunState::SchemaReady);

        let mut rng = match self.config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let rows = generate_with_rng(self.config.row_count, &self.config.payload_prefix, &mut rng);
        self.enter(RunState::DataGenerated);

        let shards = partition(rows, self.config.threads);
        let insert = spec.insert();
        // Outside the measured span.
        store.prepare(&insert, ddl_timeout)?;
        let options = WriteOptions {
            insert,
            kind: self.config.batch_kind,
            timeout: self.config.batch_timeout(),
        };
        let start = Instant::now();
        self.enter(RunState::WorkersRunning);
        let outcomes = write_shards(store, &shards, &options);
        let makespan = start.elapsed();

        let succeeded: Vec<RunResult> = outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().copied())
            .collect();
        let failed_shards = outcomes.len() - succeeded.len();
        let summary = RunSummary::aggregate(&succeeded, makespan);
        self.enter(RunState::Aggregated);

        log_info!(
            component = "runner",
            event = "run_aggregated",
            rows = summary.total_rows,
            elapsed_secs = summary.elapsed_seconds(),
            rows_per_sec = summary.throughput(),
            failed_shards,
            "inserted {} rows in {:.3} seconds. Rate: {:.2} rows/sec",
            summary.total_rows,
            summary.elapsed_seconds(),
            summary.throughput()
        );

        if failed_shards == 0 {
            Ok(Loaded { summary, outcomes })
        } else {
            Err(RunError::Workers {
                outcomes,
                partial: summary,
            })
        }
    }

    fn enter(&mut self, state: RunState) {
        log_info!(component = "runner", event = "state", state = ?state);
        self.history.push(state);
    }
}
