use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;

use super::{Connector, Endpoint, Store, WriteBatch};
use crate::{
    error::StoreError,
    observability::log_debug,
    row::{Row, KEY_LEN},
};

type Table = HashMap<[u8; KEY_LEN], String>;

/// Failures to inject into a [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Returned by [`MemoryConnector::connect`].
    pub connect: Option<StoreError>,
    /// Returned by the batch whose first row has this payload.
    pub batch_with_payload: Option<(String, StoreError)>,
    /// Returned by statements starting with the given prefix.
    pub statement_prefix: Option<(String, StoreError)>,
    /// Artificial latency of every batch.
    pub batch_latency: Duration,
}

#[derive(Debug, Default)]
struct State {
    // keyspace -> table -> rows
    keyspaces: BTreeMap<String, BTreeMap<String, Table>>,
    statements: Vec<String>,
    batches: usize,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    faults: FaultPlan,
    closed: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    prepares: AtomicUsize,
}

/// In-process store keyed by keyspace and table.
///
/// Understands the statement shapes the benchmark issues (`CREATE KEYSPACE`,
/// `CREATE TABLE`, `DROP KEYSPACE`, each with `IF [NOT] EXISTS`) and batched
/// `INSERT INTO <keyspace>.<table>`. Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_faults(FaultPlan::default())
    }
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store that injects `faults`.
    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                faults,
                closed: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                prepares: AtomicUsize::new(0),
            }),
        }
    }

    /// Whether `keyspace` currently exists.
    pub fn has_keyspace(&self, keyspace: &str) -> bool {
        self.inner.state.lock().keyspaces.contains_key(keyspace)
    }

    /// Rows stored in `keyspace.table`, if the table exists.
    pub fn row_count(&self, keyspace: &str, table: &str) -> Option<usize> {
        let state = self.inner.state.lock();
        state.keyspaces.get(keyspace)?.get(table).map(HashMap::len)
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.inner.state.lock().statements.clone()
    }

    /// Number of batches accepted.
    pub fn batches(&self) -> usize {
        self.inner.state.lock().batches
    }

    /// Number of successfully prepared inserts.
    pub fn prepares(&self) -> usize {
        self.inner.prepares.load(Ordering::SeqCst)
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of [`Store::close`] calls.
    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionUnavailable(
                "connection already closed".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(&self, statement: &str) -> Result<(), StoreError> {
        let words: Vec<String> = statement
            .split_whitespace()
            .map(|w| w.trim_end_matches(';').to_ascii_uppercase())
            .collect();
        let raw: Vec<&str> = statement.split_whitespace().collect();
        let mut state = self.inner.state.lock();
        state.statements.push(statement.trim().to_string());

        match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["CREATE", "KEYSPACE", "IF", "NOT", "EXISTS", _, ..] => {
                let name = ident(raw[5]);
                state.keyspaces.entry(name).or_default();
                Ok(())
            }
            ["CREATE", "TABLE", "IF", "NOT", "EXISTS", _, ..] => {
                let (keyspace, table) = qualified(raw[5])?;
                let tables = state.keyspaces.get_mut(&keyspace).ok_or_else(|| {
                    StoreError::InvalidRequest(format!("keyspace {keyspace} does not exist"))
                })?;
                tables.entry(table).or_default();
                Ok(())
            }
            ["DROP", "KEYSPACE", "IF", "EXISTS", _, ..] => {
                state.keyspaces.remove(&ident(raw[4]));
                Ok(())
            }
            ["DROP", "KEYSPACE", _, ..] => {
                let name = ident(raw[2]);
                state
                    .keyspaces
                    .remove(&name)
                    .map(|_| ())
                    .ok_or_else(|| {
                        StoreError::InvalidRequest(format!("keyspace {name} does not exist"))
                    })
            }
            _ => Err(StoreError::InvalidRequest(format!(
                "unsupported statement: {}",
                statement.trim()
            ))),
        }
    }
}

fn ident(word: &str) -> String {
    word.trim_end_matches(';')
        .split('(')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn qualified(word: &str) -> Result<(String, String), StoreError> {
    let name = ident(word);
    match name.split_once('.') {
        Some((keyspace, table)) => Ok((keyspace.to_string(), table.to_string())),
        None => Err(StoreError::InvalidRequest(format!(
            "no keyspace specified for {name}"
        ))),
    }
}

fn insert_target(insert: &str) -> Result<(String, String), StoreError> {
    let target = insert
        .split_whitespace()
        .skip_while(|w| !w.eq_ignore_ascii_case("INTO"))
        .nth(1)
        .ok_or_else(|| StoreError::InvalidRequest(format!("malformed insert: {insert}")))?;
    qualified(target)
}

impl Store for MemoryStore {
    fn cluster_name(&self) -> Option<String> {
        Some("in-memory".to_string())
    }

    fn execute(&self, statement: &str, _timeout: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        if let Some((prefix, err)) = &self.inner.faults.statement_prefix {
            if statement.trim_start().starts_with(prefix.as_str()) {
                return Err(err.clone());
            }
        }
        self.apply(statement)
    }

    fn prepare(&self, insert: &str, _timeout: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        let (keyspace, table) = insert_target(insert)?;
        let state = self.inner.state.lock();
        let known = state
            .keyspaces
            .get(&keyspace)
            .is_some_and(|tables| tables.contains_key(&table));
        if !known {
            return Err(StoreError::InvalidRequest(format!(
                "unconfigured table {keyspace}.{table}"
            )));
        }
        self.inner.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_batch(&self, batch: &WriteBatch<'_>, timeout: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        let faults = &self.inner.faults;
        if !faults.batch_latency.is_zero() {
            if faults.batch_latency > timeout {
                thread::sleep(timeout);
                return Err(StoreError::request_timeout(format!(
                    "no response within {timeout:?}"
                )));
            }
            thread::sleep(faults.batch_latency);
        }
        if let Some((payload, err)) = &faults.batch_with_payload {
            if batch.rows.first().is_some_and(|first| first.payload() == payload) {
                return Err(err.clone());
            }
        }

        let (keyspace, table) = insert_target(batch.insert)?;

        let mut state = self.inner.state.lock();
        let rows = state
            .keyspaces
            .get_mut(&keyspace)
            .and_then(|tables| tables.get_mut(&table))
            .ok_or_else(|| {
                StoreError::InvalidRequest(format!("unconfigured table {keyspace}.{table}"))
            })?;
        for row in batch.rows {
            rows.insert(*row.key(), row.payload().to_string());
        }
        state.batches += 1;
        log_debug!(
            component = "store",
            event = "memory_batch_applied",
            kind = %batch.kind,
            rows = batch.rows.len(),
        );
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out handles to one shared [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    /// Connector for `store`.
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// The shared store, for inspection after a run.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Connector for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, _endpoint: &Endpoint) -> Result<MemoryStore, StoreError> {
        if let Some(err) = &self.store.inner.faults.connect {
            return Err(err.clone());
        }
        self.store.inner.connects.fetch_add(1, Ordering::SeqCst);
        self.store.inner.closed.store(false, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

/// Rows as they were stored, for comparison with a generated dataset.
pub fn stored_rows(store: &MemoryStore) -> HashSet<Row> {
    let state = store.inner.state.lock();
    state
        .keyspaces
        .values()
        .flat_map(|tables| tables.values())
        .flat_map(|rows| rows.iter().map(|(k, v)| Row::new(*k, v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{row::generate, store::BatchKind};

    const T: Duration = Duration::from_secs(1);

    fn provisioned() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .execute("CREATE KEYSPACE IF NOT EXISTS ks WITH replication = {}", T)
            .unwrap();
        store
            .execute("CREATE TABLE IF NOT EXISTS ks.t (id blob PRIMARY KEY, data text)", T)
            .unwrap();
        store
    }

    #[test]
    fn batch_lands_in_table() {
        let store = provisioned();
        let rows = generate(10);
        let batch = WriteBatch {
            kind: BatchKind::Unlogged,
            insert: "INSERT INTO ks.t (id, data) VALUES (?, ?)",
            rows: &rows,
        };
        store.write_batch(&batch, T).unwrap();
        assert_eq!(store.row_count("ks", "t"), Some(10));
        assert_eq!(stored_rows(&store), rows.into_iter().collect());
    }

    #[test]
    fn prepare_requires_existing_table() {
        let insert = "INSERT INTO ks.t (id, data) VALUES (?, ?)";
        assert!(matches!(
            MemoryStore::new().prepare(insert, T),
            Err(StoreError::InvalidRequest(_))
        ));

        let store = provisioned();
        store.prepare(insert, T).unwrap();
        assert_eq!(store.prepares(), 1);
    }

    #[test]
    fn insert_into_missing_table_is_invalid() {
        let store = MemoryStore::new();
        let rows = generate(1);
        let batch = WriteBatch {
            kind: BatchKind::Unlogged,
            insert: "INSERT INTO ks.t (id, data) VALUES (?, ?)",
            rows: &rows,
        };
        assert!(matches!(
            store.write_batch(&batch, T),
            Err(StoreError::InvalidRequest(_))
        ));
    }

    #[test]
    fn drop_if_exists_is_quiet_and_closed_handle_rejects_work() {
        let store = provisioned();
        store.execute("DROP KEYSPACE IF EXISTS ks;", T).unwrap();
        store.execute("DROP KEYSPACE IF EXISTS ks;", T).unwrap();
        assert!(!store.has_keyspace("ks"));

        store.close().unwrap();
        assert!(matches!(
            store.execute("DROP KEYSPACE IF EXISTS ks", T),
            Err(StoreError::ConnectionUnavailable(_))
        ));
        assert_eq!(store.closes(), 1);
    }

    #[test]
    fn slow_batches_time_out() {
        let store = MemoryStore::with_faults(FaultPlan {
            batch_latency: Duration::from_millis(50),
            ..FaultPlan::default()
        });
        let rows = generate(1);
        let batch = WriteBatch {
            kind: BatchKind::Unlogged,
            insert: "INSERT INTO ks.t (id, data) VALUES (?, ?)",
            rows: &rows,
        };
        let err = store
            .write_batch(&batch, Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, StoreError::OperationTimeout { .. }));
    }
}
