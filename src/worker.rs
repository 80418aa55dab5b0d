//! Per-shard batch writers.
//!
//! Each shard is written by its own OS thread as one grouped request. All
//! threads are started before any is joined; each publishes exactly one
//! [`ShardOutcome`] into a shared channel, which the caller drains only after
//! every thread has been joined. A failed or panicking worker never stops its
//! siblings and is reported as its own outcome.

use std::{
    any::Any,
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::WorkerError,
    metrics::RunResult,
    observability::{log_debug, log_error, log_info},
    partition::Shard,
    store::{BatchKind, Store, WriteBatch},
};

/// How each worker submits its shard.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Parameterised insert statement.
    pub insert: String,
    /// Batch durability mode.
    pub kind: BatchKind,
    /// Execution timeout of the shard's batch.
    pub timeout: Duration,
}

/// What happened to one shard.
#[derive(Debug, Clone)]
pub struct ShardOutcome {
    /// Shard index.
    pub shard: usize,
    /// Rows the shard was assigned.
    pub assigned_rows: usize,
    /// Result of the write.
    pub result: Result<RunResult, WorkerError>,
}

/// Write `shard` as a single batch and time the submit-to-acknowledge span.
///
/// Empty shards complete immediately without contacting the store.
pub fn run_shard<S: Store + ?Sized>(
    store: &S,
    shard: &Shard,
    options: &WriteOptions,
) -> Result<RunResult, WorkerError> {
    if shard.is_empty() {
        log_debug!(component = "worker", event = "empty_shard", shard = shard.index());
        return Ok(RunResult {
            shard: shard.index(),
            rows_written: 0,
            elapsed: Duration::ZERO,
        });
    }

    let batch = WriteBatch {
        kind: options.kind,
        insert: &options.insert,
        rows: shard.rows(),
    };
    let start = Instant::now();
    store
        .write_batch(&batch, options.timeout)
        .map_err(|source| WorkerError::Store {
            shard: shard.index(),
            source,
        })?;
    let result = RunResult {
        shard: shard.index(),
        rows_written: shard.len(),
        elapsed: start.elapsed(),
    };

    log_info!(
        component = "worker",
        event = "shard_written",
        shard = result.shard,
        rows = result.rows_written,
        elapsed_secs = result.elapsed_seconds(),
        rows_per_sec = result.rows_per_second(),
        "worker finished inserting {} rows in {:.2} seconds. Rate: {:.2} rows/sec",
        result.rows_written,
        result.elapsed_seconds(),
        result.rows_per_second()
    );
    Ok(result)
}

/// Write every shard on its own thread and collect one outcome per shard,
/// ordered by shard index.
pub fn write_shards<S: Store + ?Sized>(
    store: &S,
    shards: &[Shard],
    options: &WriteOptions,
) -> Vec<ShardOutcome> {
    let (tx, rx) = flume::unbounded::<ShardOutcome>();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(shards.len());
        for shard in shards {
            let worker_tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("bulkload-worker-{}", shard.index()))
                .spawn_scoped(scope, move || {
                    let result = run_shard(store, shard, options);
                    // The receiver outlives the scope.
                    let _ = worker_tx.send(ShardOutcome {
                        shard: shard.index(),
                        assigned_rows: shard.len(),
                        result,
                    });
                });
            match spawned {
                Ok(handle) => handles.push((shard, handle)),
                Err(err) => {
                    log_error!(
                        component = "worker",
                        event = "spawn_failed",
                        shard = shard.index(),
                        error = %err,
                    );
                    let _ = tx.send(ShardOutcome {
                        shard: shard.index(),
                        assigned_rows: shard.len(),
                        result: Err(WorkerError::Spawn {
                            shard: shard.index(),
                            message: err.to_string(),
                        }),
                    });
                }
            }
        }

        for (shard, handle) in handles {
            if let Err(payload) = handle.join() {
                let message = panic_message(payload.as_ref());
                log_error!(
                    component = "worker",
                    event = "worker_panicked",
                    shard = shard.index(),
                    message = %message,
                );
                let _ = tx.send(ShardOutcome {
                    shard: shard.index(),
                    assigned_rows: shard.len(),
                    result: Err(WorkerError::Panicked {
                        shard: shard.index(),
                        message,
                    }),
                });
            }
        }
    });
    drop(tx);

    let mut outcomes: Vec<ShardOutcome> = rx.drain().collect();
    outcomes.sort_by_key(|outcome| outcome.shard);
    outcomes
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
