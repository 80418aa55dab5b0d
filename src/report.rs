//! Reporting for finished runs: a console table and an optional JSON file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use comfy_table::Table;
use serde::Serialize;

use crate::{
    config::BenchConfig,
    error::ErrorCategory,
    metrics::RunSummary,
    runner::{RunMode, RunReport},
    worker::ShardOutcome,
};

/// Timestamp-based id for one run, e.g. `20261019143005-042`.
pub fn new_run_id() -> String {
    let now = Utc::now();
    let millis = now.timestamp_subsec_millis();
    format!("{}-{millis:03}", now.format("%Y%m%d%H%M%S"))
}

/// One-line throughput summary.
pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "Inserted {} rows in {:.3} sec. Rate: {:.2} rows/sec",
        summary.total_rows,
        summary.elapsed_seconds(),
        summary.throughput()
    )
}

/// Per-shard table followed by a total row.
pub fn shard_table(outcomes: &[ShardOutcome], summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_width(100);
    table.set_header(["shard", "rows", "elapsed", "rows/s", "outcome"]);
    for outcome in outcomes {
        match &outcome.result {
            Ok(result) => table.add_row(vec![
                outcome.shard.to_string(),
                result.rows_written.to_string(),
                format!("{:.3}s", result.elapsed_seconds()),
                format!("{:.2}", result.rows_per_second()),
                "ok".to_string(),
            ]),
            Err(err) => table.add_row(vec![
                outcome.shard.to_string(),
                outcome.assigned_rows.to_string(),
                "-".to_string(),
                "-".to_string(),
                format!("failed: {err}"),
            ]),
        };
    }
    table.add_row(vec![
        "total".to_string(),
        summary.total_rows.to_string(),
        format!("{:.3}s", summary.elapsed_seconds()),
        format!("{:.2}", summary.throughput()),
        String::new(),
    ]);
    table
}

/// Serialized form of a run.
#[derive(Debug, Serialize)]
pub struct BenchResult {
    /// Run id.
    pub run_id: String,
    /// Run mode.
    pub mode: String,
    /// Contact point.
    pub endpoint: String,
    /// Cluster name, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    /// Run parameters.
    pub parameters: serde_json::Value,
    /// Aggregate metrics.
    pub metrics: serde_json::Value,
    /// Per-shard outcomes.
    pub shards: Vec<ShardRecord>,
}

/// Serialized form of one shard outcome.
#[derive(Debug, Serialize)]
pub struct ShardRecord {
    /// Shard index.
    pub shard: usize,
    /// Rows assigned to the shard.
    pub assigned_rows: usize,
    /// Rows acknowledged, zero on failure.
    pub rows_written: usize,
    /// Batch duration in seconds, absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    /// Failure category, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCategory>,
}

impl BenchResult {
    /// Build the serialized form of `report`.
    pub fn new(run_id: String, mode: RunMode, config: &BenchConfig, report: &RunReport) -> Self {
        let summary = &report.summary;
        Self {
            run_id,
            mode: mode.to_string(),
            endpoint: report.endpoint.to_string(),
            cluster_name: report.cluster_name.clone(),
            parameters: serde_json::json!({
                "row_count": config.row_count,
                "threads": config.threads,
                "batch_kind": config.batch_kind,
                "batch_timeout_secs": config.batch_timeout_secs,
                "keyspace": config.keyspace,
                "table": config.table,
                "seed": config.seed,
            }),
            metrics: serde_json::json!({
                "total_rows": summary.total_rows,
                "elapsed_secs": summary.elapsed_seconds(),
                "rows_per_sec": summary.throughput(),
                "workers": summary.workers,
                "worker_latency_us": {
                    "min": summary.latency.min_us,
                    "max": summary.latency.max_us,
                    "mean": summary.latency.mean_us(),
                },
            }),
            shards: report.outcomes.iter().map(ShardRecord::from).collect(),
        }
    }
}

impl From<&ShardOutcome> for ShardRecord {
    fn from(outcome: &ShardOutcome) -> Self {
        match &outcome.result {
            Ok(result) => Self {
                shard: outcome.shard,
                assigned_rows: outcome.assigned_rows,
                rows_written: result.rows_written,
                elapsed_secs: Some(result.elapsed_seconds()),
                error: None,
            },
            Err(err) => Self {
                shard: outcome.shard,
                assigned_rows: outcome.assigned_rows,
                rows_written: 0,
                elapsed_secs: None,
                error: Some(err.category()),
            },
        }
    }
}

/// Writes [`BenchResult`] files under a results directory.
pub struct BenchResultWriter {
    base_dir: PathBuf,
}

impl BenchResultWriter {
    /// Writer rooted at `base_dir`, created if missing.
    pub fn new(base_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { base_dir: dir })
    }

    /// Write `result` as `<run_id>.json` and return its path.
    pub fn write(&self, result: &BenchResult) -> anyhow::Result<PathBuf> {
        let path = self.base_dir.join(format!("{}.json", result.run_id));
        let buf = serde_json::to_vec_pretty(result)?;
        fs::write(&path, buf)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        error::{StoreError, WorkerError},
        metrics::RunResult,
        store::Endpoint,
    };

    fn report() -> RunReport {
        let ok = RunResult {
            shard: 0,
            rows_written: 4,
            elapsed: Duration::from_millis(500),
        };
        RunReport {
            endpoint: Endpoint::new("127.0.0.1", 9042),
            cluster_name: Some("bench".to_string()),
            summary: RunSummary::aggregate(&[ok], Duration::from_secs(1)),
            outcomes: vec![
                ShardOutcome {
                    shard: 0,
                    assigned_rows: 4,
                    result: Ok(ok),
                },
                ShardOutcome {
                    shard: 1,
                    assigned_rows: 3,
                    result: Err(WorkerError::Store {
                        shard: 1,
                        source: StoreError::Unauthorized("no".to_string()),
                    }),
                },
            ],
            cleanup_error: None,
        }
    }

    #[test]
    fn summary_line_uses_makespan() {
        let report = report();
        assert_eq!(
            summary_line(&report.summary),
            "Inserted 4 rows in 1.000 sec. Rate: 4.00 rows/sec"
        );
    }

    #[test]
    fn table_lists_every_shard_and_total() {
        let report = report();
        let rendered = shard_table(&report.outcomes, &report.summary).to_string();
        assert!(rendered.contains("total"));
        assert!(rendered.contains("failed: shard 1 failed"));
    }

    #[test]
    fn writes_json_result() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BenchResultWriter::new(dir.path().join("results")).unwrap();
        let report = report();
        let result = BenchResult::new(
            "run-1".to_string(),
            RunMode::Random,
            &BenchConfig::default(),
            &report,
        );
        let path = writer.write(&result).unwrap();
        assert_eq!(path.file_name().unwrap(), "run-1.json");

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["metrics"]["total_rows"], 4);
        assert_eq!(value["parameters"]["batch_kind"], "unlogged");
        assert_eq!(value["shards"][1]["error"], "unauthorized");
        assert!(value["shards"][1].get("elapsed_secs").is_none());
    }

    #[test]
    fn run_ids_are_timestamps() {
        let id = new_run_id();
        assert_eq!(id.len(), "20261019143005-042".len());
        assert_eq!(&id[14..15], "-");
    }
}
