use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Import pipeline limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Read-ahead budget for format detection; detection falls back to file
    /// extensions once a probe reads past it
    #[serde(default = "default_mark_limit")]
    pub mark_limit: ByteSize,
    /// Zip entries inspected when sniffing for `pass.json`
    #[serde(default = "default_pkpass_probe_entries")]
    pub pkpass_probe_entries: usize,
    /// Largest archive or JSON document a handler will read
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: ByteSize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mark_limit: default_mark_limit(),
            pkpass_probe_entries: default_pkpass_probe_entries(),
            max_archive_bytes: default_max_archive_bytes(),
        }
    }
}

impl IngestConfig {
    pub fn mark_limit_bytes(&self) -> usize {
        usize::try_from(self.mark_limit.as_u64()).unwrap_or(usize::MAX)
    }
}

fn default_mark_limit() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MiB
}

fn default_pkpass_probe_entries() -> usize {
    10
}

fn default_max_archive_bytes() -> ByteSize {
    ByteSize(16 * 1024 * 1024)
}

/// Local pass store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/passes")
}

/// Log output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
