#![deny(missing_docs)]
//! Parallel bulk-load benchmark driver for wide-column CQL stores.
//!
//! The driver provisions a throwaway keyspace, generates synthetic rows,
//! splits them round-robin across worker threads, writes each shard as a
//! single batch, and reports the wall-clock throughput of the parallel
//! phase. The keyspace is dropped and the connection released on every
//! exit path once a connection has been acquired.
//!
//! The store itself sits behind the [`store::Store`] seam: the
//! [`store::scylla`] adapter talks CQL, while [`store::memory`] runs the
//! pipeline in-process.

pub(crate) mod observability;

/// Command-line surface and exit-code mapping.
pub mod cli;
/// Benchmark configuration.
pub mod config;
/// Error taxonomy shared by the store, workers and runner.
pub mod error;
/// Run results and throughput aggregation.
pub mod metrics;
/// Round-robin partitioning of the dataset into shards.
pub mod partition;
/// Human and JSON reports for a finished run.
pub mod report;
/// Synthetic row generation.
pub mod row;
/// Benchmark orchestration.
pub mod runner;
/// Keyspace and table provisioning.
pub mod schema;
/// Scoped connection lifetime with guaranteed cleanup.
pub mod session;
/// Store abstraction and its backends.
pub mod store;
/// Per-shard batch writers.
pub mod worker;

pub use crate::{
    config::BenchConfig,
    error::{ErrorCategory, RunError, StoreError},
    runner::{BenchmarkRunner, RunMode, RunReport},
};
