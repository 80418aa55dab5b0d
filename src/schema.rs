//! Benchmark keyspace and table DDL.

use std::time::Duration;

use crate::{
    config::BenchConfig,
    error::StoreError,
    observability::log_info,
    store::Store,
};

/// Names and replication of the throwaway benchmark schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSpec {
    /// Keyspace created and dropped by the run.
    pub keyspace: String,
    /// Table receiving `(id blob, data text)` rows.
    pub table: String,
    /// `SimpleStrategy` replication factor.
    pub replication_factor: u32,
}

impl SchemaSpec {
    /// Schema described by `config`.
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            keyspace: config.keyspace.clone(),
            table: config.table.clone(),
            replication_factor: config.replication_factor,
        }
    }

    /// `CREATE KEYSPACE IF NOT EXISTS` statement.
    pub fn create_keyspace(&self) -> String {
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', \
             'replication_factor': {}}}",
            self.keyspace, self.replication_factor
        )
    }

    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub fn create_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (id blob PRIMARY KEY, data text)",
            self.keyspace, self.table
        )
    }

    /// `DROP KEYSPACE IF EXISTS` statement.
    pub fn drop_keyspace(&self) -> String {
        format!("DROP KEYSPACE IF EXISTS {}", self.keyspace)
    }

    /// Parameterised insert bound once per row.
    pub fn insert(&self) -> String {
        format!(
            "INSERT INTO {}.{} (id, data) VALUES (?, ?)",
            self.keyspace, self.table
        )
    }
}

/// Create the keyspace and table if absent. Safe to repeat.
pub fn provision<S: Store + ?Sized>(
    store: &S,
    spec: &SchemaSpec,
    timeout: Duration,
) -> Result<(), StoreError> {
    store.execute(&spec.create_keyspace(), timeout)?;
    store.execute(&spec.create_table(), timeout)?;
    log_info!(
        component = "schema",
        event = "schema_ready",
        keyspace = %spec.keyspace,
        table = %spec.table,
    );
    Ok(())
}

/// Drop the benchmark keyspace if present.
pub fn teardown<S: Store + ?Sized>(
    store: &S,
    spec: &SchemaSpec,
    timeout: Duration,
) -> Result<(), StoreError> {
    store.execute(&spec.drop_keyspace(), timeout)?;
    log_info!(
        component = "schema",
        event = "keyspace_dropped",
        keyspace = %spec.keyspace,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const T: Duration = Duration::from_secs(1);

    fn spec() -> SchemaSpec {
        SchemaSpec::from_config(&BenchConfig::default())
    }

    #[test]
    fn statements_target_configured_names() {
        let spec = spec();
        assert_eq!(
            spec.create_table(),
            "CREATE TABLE IF NOT EXISTS testkeyspace.testtable (id blob PRIMARY KEY, data text)"
        );
        assert_eq!(spec.drop_keyspace(), "DROP KEYSPACE IF EXISTS testkeyspace");
        assert!(spec.create_keyspace().contains("'replication_factor': 1"));
        assert_eq!(
            spec.insert(),
            "INSERT INTO testkeyspace.testtable (id, data) VALUES (?, ?)"
        );
    }

    #[test]
    fn provisioning_twice_is_idempotent() {
        let store = MemoryStore::new();
        let spec = spec();
        provision(&store, &spec, T).unwrap();
        provision(&store, &spec, T).unwrap();
        assert_eq!(store.row_count("testkeyspace", "testtable"), Some(0));
    }

    #[test]
    fn drop_removes_keyspace_and_tolerates_absence() {
        let store = MemoryStore::new();
        let spec = spec();
        teardown(&store, &spec, T).unwrap();
        provision(&store, &spec, T).unwrap();
        teardown(&store, &spec, T).unwrap();
        assert!(!store.has_keyspace("testkeyspace"));
    }
}
