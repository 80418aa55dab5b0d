use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::store::{BatchKind, Endpoint};

/// Default number of rows generated per run.
pub const DEFAULT_ROW_COUNT: usize = 1_000_000;
/// Default CQL native-protocol port.
pub const DEFAULT_PORT: u16 = 9042;
/// Default execution timeout applied to each shard batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(120);
/// Default timeout for schema statements.
pub const DEFAULT_DDL_TIMEOUT: Duration = Duration::from_secs(60);

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("{field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The config file could not be read.
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid YAML for [`BenchConfig`].
    #[error("parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Full configuration of one benchmark run.
///
/// Every field has a default, so a YAML file only needs the fields it
/// overrides:
///
/// ```yaml
/// row_count: 200000
/// threads: 8
/// host: 10.0.0.7
/// batch_timeout_secs: 30
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Number of rows to generate and write.
    pub row_count: usize,
    /// Number of concurrent writer threads (one shard each).
    pub threads: usize,
    /// Contact point address.
    pub host: String,
    /// Contact point port.
    pub port: u16,
    /// Execution timeout for each shard batch, in seconds.
    pub batch_timeout_secs: u64,
    /// Timeout for schema statements, in seconds.
    pub ddl_timeout_secs: u64,
    /// Throwaway keyspace created and dropped by the run.
    pub keyspace: String,
    /// Table inside `keyspace` that receives the rows.
    pub table: String,
    /// Replication factor of the benchmark keyspace.
    pub replication_factor: u32,
    /// Batch mode used by the writers.
    pub batch_kind: BatchKind,
    /// Prefix of each row's payload text.
    pub payload_prefix: String,
    /// Seed for key generation; random when unset.
    pub seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            row_count: DEFAULT_ROW_COUNT,
            threads: 1,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT.as_secs(),
            ddl_timeout_secs: DEFAULT_DDL_TIMEOUT.as_secs(),
            keyspace: "testkeyspace".to_string(),
            table: "testtable".to_string(),
            replication_factor: 1,
            batch_kind: BatchKind::Unlogged,
            payload_prefix: crate::row::DEFAULT_PAYLOAD_PREFIX.to_string(),
            seed: None,
        }
    }
}

impl BenchConfig {
    /// Load a config from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let cfg: BenchConfig = serde_yaml::from_str(&content)?;
        Ok(cfg)
    }

    /// Contact point of the store.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Execution timeout for a shard batch.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Timeout for schema statements.
    pub fn ddl_timeout(&self) -> Duration {
        Duration::from_secs(self.ddl_timeout_secs)
    }

    /// Reject configurations the runner cannot execute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.row_count == 0 {
            return Err(invalid("row_count", "must be positive"));
        }
        if self.threads == 0 {
            return Err(invalid("threads", "must be positive"));
        }
        if self.host.trim().is_empty() {
            return Err(invalid("host", "must not be empty"));
        }
        if self.batch_timeout_secs == 0 {
            return Err(invalid("batch_timeout_secs", "must be positive"));
        }
        if self.ddl_timeout_secs == 0 {
            return Err(invalid("ddl_timeout_secs", "must be positive"));
        }
        if self.replication_factor == 0 {
            return Err(invalid("replication_factor", "must be positive"));
        }
        check_identifier("keyspace", &self.keyspace)?;
        check_identifier("table", &self.table)?;
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// Names are spliced into DDL unquoted, so only plain CQL identifiers pass.
fn check_identifier(field: &'static str, name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') || name.len() > 48 {
        return Err(invalid(
            field,
            format!("`{name}` is not a valid identifier (letter, then up to 47 of [A-Za-z0-9_])"),
        ));
    }
    Ok(())
}
