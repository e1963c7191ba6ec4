//! Tracing setup and import counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this
/// twice is harmless; the second subscriber is ignored.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}

/// Counters for the import pipeline. Failures are counted per error code.
#[derive(Debug, Default)]
pub struct Metrics {
    passes_imported: AtomicU64,
    passes_deleted: AtomicU64,
    unsupported_format: AtomicU64,
    parsing_failed: AtomicU64,
    parsing_exception: AtomicU64,
    validation_failed: AtomicU64,
    unexpected_error: AtomicU64,
    store_error: AtomicU64,
    io_error: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass_imported(&self) {
        self.passes_imported.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "passes_imported", "Metric incremented");
    }

    /// Count a failed import under its error code. Unknown codes and task
    /// join failures land in `unexpected_error`.
    pub fn import_failed(&self, code: &str) {
        let counter = match code {
            "UNSUPPORTED_FORMAT" => &self.unsupported_format,
            "PARSING_FAILED" => &self.parsing_failed,
            "PARSING_EXCEPTION" => &self.parsing_exception,
            "VALIDATION_FAILED" => &self.validation_failed,
            "STORE_ERROR" => &self.store_error,
            "IO_ERROR" => &self.io_error,
            _ => &self.unexpected_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "imports_failed", code, "Metric incremented");
    }

    pub fn pass_deleted(&self) {
        self.passes_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "passes_deleted", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            passes_imported: load(&self.passes_imported),
            passes_deleted: load(&self.passes_deleted),
            failures: FailureCounts {
                unsupported_format: load(&self.unsupported_format),
                parsing_failed: load(&self.parsing_failed),
                parsing_exception: load(&self.parsing_exception),
                validation_failed: load(&self.validation_failed),
                unexpected_error: load(&self.unexpected_error),
                store_error: load(&self.store_error),
                io_error: load(&self.io_error),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub passes_imported: u64,
    pub passes_deleted: u64,
    pub failures: FailureCounts,
}

impl MetricsSnapshot {
    pub fn imports_failed(&self) -> u64 {
        self.failures.total()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub unsupported_format: u64,
    pub parsing_failed: u64,
    pub parsing_exception: u64,
    pub validation_failed: u64,
    pub unexpected_error: u64,
    pub store_error: u64,
    pub io_error: u64,
}

impl FailureCounts {
    pub fn total(&self) -> u64 {
        self.unsupported_format
            + self.parsing_failed
            + self.parsing_exception
            + self.validation_failed
            + self.unexpected_error
            + self.store_error
            + self.io_error
    }
}
