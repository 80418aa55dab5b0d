use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use ::scylla::{
    batch::{Batch, BatchType},
    prepared_statement::PreparedStatement,
    transport::errors::{DbError, NewSessionError, QueryError},
    Session, SessionBuilder,
};
use parking_lot::Mutex;
use tokio::runtime::Runtime;

use super::{BatchKind, Connector, Endpoint, Store, WriteBatch};
use crate::{
    error::{StoreError, TimeoutKind},
    observability::{log_debug, log_info},
};

const CLUSTER_NAME_QUERY: &str = "SELECT cluster_name FROM system.local";

/// Connects to a CQL cluster through the `scylla` driver.
#[derive(Debug, Clone)]
pub struct ScyllaConnector {
    connect_timeout: Duration,
}

impl Default for ScyllaConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ScyllaConnector {
    /// Connector giving up on unreachable contact points after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for ScyllaConnector {
    type Store = ScyllaStore;

    fn connect(&self, endpoint: &Endpoint) -> Result<ScyllaStore, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("bulkload-driver")
            .build()
            .map_err(|err| StoreError::Unclassified(format!("start driver runtime: {err}")))?;

        let session = runtime
            .block_on(
                SessionBuilder::new()
                    .known_node(endpoint.to_string())
                    .connection_timeout(self.connect_timeout)
                    .build(),
            )
            .map_err(map_session_error)?;

        let cluster_name = runtime.block_on(async {
            let result = session.query_unpaged(CLUSTER_NAME_QUERY, ()).await.ok()?;
            result
                .first_row_typed::<(String,)>()
                .ok()
                .map(|(name,)| name)
        });
        log_info!(
            component = "store",
            event = "connected",
            endpoint = %endpoint,
            cluster = cluster_name.as_deref().unwrap_or("unknown"),
        );

        Ok(ScyllaStore {
            session: Mutex::new(Some(Arc::new(session))),
            prepared: Mutex::new(HashMap::new()),
            runtime,
            cluster_name,
        })
    }
}

/// Blocking handle over an async driver session.
///
/// Each call parks the calling thread on the driver runtime, so many worker
/// threads can have requests in flight at once.
pub struct ScyllaStore {
    // Declared before `runtime` so the session drops while the runtime lives.
    session: Mutex<Option<Arc<Session>>>,
    // insert text -> prepared statement
    prepared: Mutex<HashMap<String, PreparedStatement>>,
    runtime: Runtime,
    cluster_name: Option<String>,
}

impl ScyllaStore {
    fn session(&self) -> Result<Arc<Session>, StoreError> {
        self.session.lock().clone().ok_or_else(|| {
            StoreError::ConnectionUnavailable("session already closed".to_string())
        })
    }

    fn prepared(&self, insert: &str, timeout: Duration) -> Result<PreparedStatement, StoreError> {
        if let Some(statement) = self.prepared.lock().get(insert) {
            return Ok(statement.clone());
        }
        let session = self.session()?;
        let statement = self.run(timeout, async move { session.prepare(insert).await })?;
        self.prepared.lock().insert(insert.to_string(), statement.clone());
        log_debug!(component = "store", event = "prepared", statement = %insert);
        Ok(statement)
    }

    fn run<T>(
        &self,
        timeout: Duration,
        fut: impl Future<Output = Result<T, QueryError>>,
    ) -> Result<T, StoreError> {
        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result.map_err(map_query_error),
                Err(_) => Err(StoreError::request_timeout(format!(
                    "no response within {timeout:?}"
                ))),
            }
        })
    }
}

impl Store for ScyllaStore {
    fn cluster_name(&self) -> Option<String> {
        self.cluster_name.clone()
    }

    fn execute(&self, statement: &str, timeout: Duration) -> Result<(), StoreError> {
        let session = self.session()?;
        log_debug!(component = "store", event = "execute", statement = %statement.trim());
        self.run(timeout, async move {
            session.query_unpaged(statement, ()).await.map(|_| ())
        })
    }

    fn prepare(&self, insert: &str, timeout: Duration) -> Result<(), StoreError> {
        self.prepared(insert, timeout).map(|_| ())
    }

    fn write_batch(&self, batch: &WriteBatch<'_>, timeout: Duration) -> Result<(), StoreError> {
        let prepared = self.prepared(batch.insert, timeout)?;
        let session = self.session()?;
        let batch_type = match batch.kind {
            BatchKind::Unlogged => BatchType::Unlogged,
            BatchKind::Logged => BatchType::Logged,
        };
        self.run(timeout, async move {
            let mut statements = Batch::new(batch_type);
            let mut values = Vec::with_capacity(batch.rows.len());
            for row in batch.rows {
                statements.append_statement(prepared.clone());
                values.push((row.key().as_slice(), row.payload()));
            }
            session.batch(&statements, values).await.map(|_| ())
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        // Dropping the last session handle closes its connection pools.
        let _enter = self.runtime.enter();
        self.session.lock().take();
        self.prepared.lock().clear();
        Ok(())
    }
}

fn map_session_error(err: NewSessionError) -> StoreError {
    match err {
        NewSessionError::DbError(DbError::AuthenticationError, message) => {
            StoreError::AuthenticationFailed(message)
        }
        NewSessionError::DbError(db, message) => map_db_error(db, message),
        other => StoreError::ConnectionUnavailable(other.to_string()),
    }
}

fn map_query_error(err: QueryError) -> StoreError {
    match err {
        QueryError::DbError(db, message) => map_db_error(db, message),
        QueryError::BadQuery(bad) => StoreError::InvalidRequest(bad.to_string()),
        QueryError::RequestTimeout(message) => StoreError::request_timeout(message),
        QueryError::TimeoutError => StoreError::request_timeout("driver timeout"),
        other => StoreError::Unclassified(other.to_string()),
    }
}

fn map_db_error(db: DbError, message: String) -> StoreError {
    match db {
        DbError::AuthenticationError => StoreError::AuthenticationFailed(message),
        DbError::Unauthorized => StoreError::Unauthorized(message),
        DbError::ReadTimeout { .. } => StoreError::OperationTimeout {
            kind: TimeoutKind::Read,
            message,
        },
        DbError::WriteTimeout { .. } => StoreError::OperationTimeout {
            kind: TimeoutKind::Write,
            message,
        },
        DbError::SyntaxError | DbError::Invalid | DbError::AlreadyExists { .. } => {
            StoreError::InvalidRequest(message)
        }
        other => StoreError::Unclassified(format!("{other}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_to_categories() {
        use crate::error::ErrorCategory;

        let cases = [
            (DbError::AuthenticationError, ErrorCategory::AuthenticationFailed),
            (DbError::Unauthorized, ErrorCategory::Unauthorized),
            (DbError::SyntaxError, ErrorCategory::InvalidRequest),
            (DbError::Invalid, ErrorCategory::InvalidRequest),
            (DbError::Overloaded, ErrorCategory::Unclassified),
        ];
        for (db, category) in cases {
            assert_eq!(map_db_error(db, "msg".to_string()).category(), category);
        }
    }

    #[test]
    fn driver_timeouts_are_operation_timeouts() {
        let err = map_query_error(QueryError::RequestTimeout("slow".to_string()));
        assert!(matches!(
            err,
            StoreError::OperationTimeout {
                kind: TimeoutKind::Request,
                ..
            }
        ));
    }
}
