use std::fmt;

use crate::{config::ConfigError, metrics::RunSummary, runner::RunMode, worker::ShardOutcome};

/// Which side of a request timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The coordinator gave up waiting for replica reads.
    Read,
    /// The coordinator gave up waiting for replica writes.
    Write,
    /// The client-side execution timeout elapsed before an answer arrived.
    Request,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Read => f.write_str("read"),
            TimeoutKind::Write => f.write_str("write"),
            TimeoutKind::Request => f.write_str("request"),
        }
    }
}

/// Failure reported by the store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No host could be reached.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),
    /// The store rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    /// A read, write or client-side timeout.
    #[error("{kind} timeout: {message}")]
    OperationTimeout {
        /// Side that timed out.
        kind: TimeoutKind,
        /// Store-provided detail.
        message: String,
    },
    /// Malformed schema or query.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Permission denied.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Anything the categories above do not cover.
    #[error("{0}")]
    Unclassified(String),
}

impl StoreError {
    /// Fieldless category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::ConnectionUnavailable(_) => ErrorCategory::ConnectionUnavailable,
            StoreError::AuthenticationFailed(_) => ErrorCategory::AuthenticationFailed,
            StoreError::OperationTimeout { .. } => ErrorCategory::OperationTimeout,
            StoreError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            StoreError::Unauthorized(_) => ErrorCategory::Unauthorized,
            StoreError::Unclassified(_) => ErrorCategory::Unclassified,
        }
    }

    /// Client-side timeout helper.
    pub fn request_timeout(message: impl Into<String>) -> Self {
        StoreError::OperationTimeout {
            kind: TimeoutKind::Request,
            message: message.into(),
        }
    }

    /// One-line human diagnostic for this error.
    ///
    /// `endpoint` is only used for connection failures.
    pub fn diagnostic(&self, endpoint: &str) -> String {
        match self {
            StoreError::ConnectionUnavailable(_) => format!(
                "Connection error: failed to connect to the store at {endpoint}. Check the \
                 address and port."
            ),
            StoreError::AuthenticationFailed(_) => {
                "Authentication error: incorrect credentials.".to_string()
            }
            StoreError::OperationTimeout { kind, .. } => {
                format!("Timeout error: the {kind} operation took too long.")
            }
            StoreError::InvalidRequest(message) => format!("Query execution error: {message}"),
            StoreError::Unauthorized(_) => {
                "Access error: insufficient permissions to perform the operation.".to_string()
            }
            StoreError::Unclassified(message) => format!("Unknown error: {message}"),
        }
    }
}

/// Failure categories surfaced to the user and mapped to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Host unreachable.
    ConnectionUnavailable,
    /// Bad credentials.
    AuthenticationFailed,
    /// Read, write or request timeout.
    OperationTimeout,
    /// Malformed schema or query.
    InvalidRequest,
    /// Permission denied.
    Unauthorized,
    /// Catch-all.
    Unclassified,
    /// A worker thread panicked before reporting.
    WorkerPanicked,
}

/// Failure of a single shard write.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    /// The store rejected or timed out the shard's batch.
    #[error("shard {shard} failed: {source}")]
    Store {
        /// Shard index.
        shard: usize,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
    /// The worker thread could not be started.
    #[error("shard {shard} worker could not start: {message}")]
    Spawn {
        /// Shard index.
        shard: usize,
        /// OS error text.
        message: String,
    },
    /// The worker thread panicked.
    #[error("shard {shard} worker panicked: {message}")]
    Panicked {
        /// Shard index.
        shard: usize,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl WorkerError {
    /// Index of the failed shard.
    pub fn shard(&self) -> usize {
        match self {
            WorkerError::Store { shard, .. }
            | WorkerError::Spawn { shard, .. }
            | WorkerError::Panicked { shard, .. } => *shard,
        }
    }

    /// Category of the failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkerError::Store { source, .. } => source.category(),
            WorkerError::Spawn { .. } => ErrorCategory::Unclassified,
            WorkerError::Panicked { .. } => ErrorCategory::WorkerPanicked,
        }
    }

    /// One-line human diagnostic.
    pub fn diagnostic(&self, endpoint: &str) -> String {
        match self {
            WorkerError::Store { shard, source } => {
                format!("shard {shard}: {}", source.diagnostic(endpoint))
            }
            WorkerError::Spawn { shard, message } => {
                format!("shard {shard}: worker could not start: {message}")
            }
            WorkerError::Panicked { shard, message } => {
                format!("shard {shard}: worker panicked: {message}")
            }
        }
    }
}

/// Failure of a whole benchmark run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Invalid configuration; nothing was contacted.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The mode parses but has no implementation.
    #[error("run mode `{0}` is not implemented")]
    Unimplemented(RunMode),
    /// Connecting or provisioning failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// At least one shard failed; `partial` aggregates the shards that succeeded.
    #[error("{} of {} shards failed", failed_shards(.outcomes), .outcomes.len())]
    Workers {
        /// Every shard's outcome, ordered by shard index.
        outcomes: Vec<ShardOutcome>,
        /// Aggregate over the successful shards.
        partial: RunSummary,
    },
}

fn failed_shards(outcomes: &[ShardOutcome]) -> usize {
    outcomes.iter().filter(|o| o.result.is_err()).count()
}

impl RunError {
    /// Category reported for this run. For shard failures this is the
    /// category of the lowest-indexed failed shard.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            RunError::Config(_) | RunError::Unimplemented(_) => None,
            RunError::Store(err) => Some(err.category()),
            RunError::Workers { .. } => self.worker_failures().next().map(WorkerError::category),
        }
    }

    /// Failed shards, by shard index. Empty unless this is [`RunError::Workers`].
    pub fn worker_failures(&self) -> impl Iterator<Item = &WorkerError> {
        let outcomes = match self {
            RunError::Workers { outcomes, .. } => outcomes.as_slice(),
            _ => &[][..],
        };
        outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_share_one_category() {
        let read = StoreError::OperationTimeout {
            kind: TimeoutKind::Read,
            message: "replicas".into(),
        };
        let client = StoreError::request_timeout("120s elapsed");
        assert_eq!(read.category(), ErrorCategory::OperationTimeout);
        assert_eq!(client.category(), ErrorCategory::OperationTimeout);
        assert_eq!(
            client.diagnostic("127.0.0.1:9042"),
            "Timeout error: the request operation took too long."
        );
    }

    #[test]
    fn connection_diagnostic_names_endpoint() {
        let err = StoreError::ConnectionUnavailable("refused".into());
        assert!(err.diagnostic("10.0.0.7:9042").contains("10.0.0.7:9042"));
    }

    fn failed(shard: usize, err: WorkerError) -> ShardOutcome {
        ShardOutcome {
            shard,
            assigned_rows: 10,
            result: Err(err),
        }
    }

    #[test]
    fn worker_failures_report_first_shard_category() {
        let ok = ShardOutcome {
            shard: 0,
            assigned_rows: 10,
            result: Ok(crate::metrics::RunResult {
                shard: 0,
                rows_written: 10,
                elapsed: std::time::Duration::from_millis(3),
            }),
        };
        let err = RunError::Workers {
            outcomes: vec![
                ok,
                failed(
                    1,
                    WorkerError::Store {
                        shard: 1,
                        source: StoreError::Unauthorized("no".into()),
                    },
                ),
                failed(
                    2,
                    WorkerError::Panicked {
                        shard: 2,
                        message: "boom".into(),
                    },
                ),
            ],
            partial: RunSummary::default(),
        };
        assert_eq!(err.category(), Some(ErrorCategory::Unauthorized));
        assert_eq!(err.worker_failures().count(), 2);
        assert_eq!(err.to_string(), "2 of 3 shards failed");
    }
}
