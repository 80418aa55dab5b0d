//! Scoped connection lifetime.
//!
//! A [`SessionGuard`] owns the store handle from the moment a connection
//! exists. Releasing it, explicitly or on drop, drops the benchmark keyspace
//! and then closes the handle. Neither step is retried.

use std::time::Duration;

use crate::{
    error::StoreError,
    observability::{log_info, log_warn},
    schema::{self, SchemaSpec},
    store::Store,
};

/// Store handle that cleans up the benchmark keyspace and disconnects on every
/// exit path.
pub struct SessionGuard<S: Store> {
    store: Option<S>,
    schema: SchemaSpec,
    ddl_timeout: Duration,
}

impl<S: Store> SessionGuard<S> {
    /// Take ownership of a connected `store`.
    pub fn new(store: S, schema: SchemaSpec, ddl_timeout: Duration) -> Self {
        Self {
            store: Some(store),
            schema,
            ddl_timeout,
        }
    }

    /// The live handle.
    pub fn store(&self) -> &S {
        // Only `release` and `drop` take the handle, and both consume the guard.
        match &self.store {
            Some(store) => store,
            None => unreachable!("store taken before guard was consumed"),
        }
    }

    /// Schema this guard cleans up.
    pub fn schema(&self) -> &SchemaSpec {
        &self.schema
    }

    /// Drop the keyspace and close the handle now, reporting the first failure.
    pub fn release(mut self) -> Result<(), StoreError> {
        match self.store.take() {
            Some(store) => release(&store, &self.schema, self.ddl_timeout),
            None => Ok(()),
        }
    }
}

impl<S: Store> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            // Failures are already logged.
            let _ = release(&store, &self.schema, self.ddl_timeout);
        }
    }
}

fn release<S: Store>(store: &S, spec: &SchemaSpec, timeout: Duration) -> Result<(), StoreError> {
    log_info!(component = "session", event = "cleanup", keyspace = %spec.keyspace);
    let cleaned = schema::teardown(store, spec, timeout);
    if let Err(err) = &cleaned {
        log_warn!(component = "session", event = "cleanup_failed", error = %err);
    }

    log_info!(component = "session", event = "disconnect");
    let closed = store.close();
    if let Err(err) = &closed {
        log_warn!(component = "session", event = "disconnect_failed", error = %err);
    }
    cleaned.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BenchConfig,
        store::memory::{FaultPlan, MemoryStore},
    };

    const T: Duration = Duration::from_secs(1);

    fn provisioned(faults: FaultPlan) -> (MemoryStore, SchemaSpec) {
        let store = MemoryStore::with_faults(faults);
        let spec = SchemaSpec::from_config(&BenchConfig::default());
        schema::provision(&store, &spec, T).unwrap();
        (store, spec)
    }

    #[test]
    fn drop_cleans_up_and_disconnects() {
        let (store, spec) = provisioned(FaultPlan::default());
        {
            let _guard = SessionGuard::new(store.clone(), spec, T);
        }
        assert!(!store.has_keyspace("testkeyspace"));
        assert_eq!(store.closes(), 1);
    }

    #[test]
    fn release_runs_once() {
        let (store, spec) = provisioned(FaultPlan::default());
        let guard = SessionGuard::new(store.clone(), spec, T);
        guard.release().unwrap();
        assert_eq!(store.closes(), 1);
    }

    #[test]
    fn failed_cleanup_still_disconnects() {
        let (store, spec) = provisioned(FaultPlan {
            statement_prefix: Some((
                "DROP".to_string(),
                StoreError::Unauthorized("drop denied".to_string()),
            )),
            ..FaultPlan::default()
        });
        let guard = SessionGuard::new(store.clone(), spec, T);
        assert!(matches!(guard.release(), Err(StoreError::Unauthorized(_))));
        assert!(store.has_keyspace("testkeyspace"));
        assert_eq!(store.closes(), 1);
    }

    #[test]
    fn cleanup_runs_when_unwinding() {
        let (store, spec) = provisioned(FaultPlan::default());
        let handle = store.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = SessionGuard::new(handle, spec, T);
            panic!("setup exploded");
        }));
        assert!(result.is_err());
        assert!(!store.has_keyspace("testkeyspace"));
        assert_eq!(store.closes(), 1);
    }
}
