//! The store the benchmark writes into.
//!
//! Runner and workers only see the blocking [`Store`] contract. Handles must
//! be safe to share across threads: every worker issues its batch through the
//! same handle.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::StoreError, row::Row};

/// In-process store with fault injection.
pub mod memory;
/// CQL driver adapter.
pub mod scylla;

/// Contact point of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// Native-protocol port.
    pub port: u16,
}

impl Endpoint {
    /// Build an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Durability mode of a grouped write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// No batch log: no atomicity across rows, lowest latency.
    #[default]
    Unlogged,
    /// Batch log: all-or-nothing across partitions.
    Logged,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Unlogged => f.write_str("unlogged"),
            BatchKind::Logged => f.write_str("logged"),
        }
    }
}

/// One grouped write: `insert` bound once per row, in row order.
///
/// `insert` takes two markers, the key blob and the payload text.
#[derive(Debug, Clone, Copy)]
pub struct WriteBatch<'a> {
    /// Batch durability mode.
    pub kind: BatchKind,
    /// Parameterised insert statement.
    pub insert: &'a str,
    /// Rows to bind, in submission order.
    pub rows: &'a [Row],
}

/// Live handle to a store.
pub trait Store: Send + Sync {
    /// Descriptive cluster name, when the store reports one.
    fn cluster_name(&self) -> Option<String> {
        None
    }

    /// Execute one unparameterised statement.
    fn execute(&self, statement: &str, timeout: Duration) -> Result<(), StoreError>;

    /// Make `insert` ready for later batches, so that preparing it does not
    /// count towards a batch's measured time.
    fn prepare(&self, _insert: &str, _timeout: Duration) -> Result<(), StoreError> {
        Ok(())
    }

    /// Submit `batch` as a single request.
    fn write_batch(&self, batch: &WriteBatch<'_>, timeout: Duration) -> Result<(), StoreError>;

    /// Release the connection. Later calls on this handle fail with
    /// [`StoreError::ConnectionUnavailable`].
    fn close(&self) -> Result<(), StoreError>;
}

/// Opens [`Store`] handles.
pub trait Connector {
    /// Handle type produced by this connector.
    type Store: Store;

    /// Connect to `endpoint`.
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Store, StoreError>;
}
