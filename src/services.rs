//! Import pipeline: parse a file off the async runtime, then persist it

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::handlers::{ParseErrorCode, ParseOutcome, PassManager};
use crate::model::generate_pass_id;
use crate::observability::Metrics;
use crate::store::{PassStore, StoreError};

/// Fresh ids tried after an id collision before giving up
const MAX_ID_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{code}: {message}")]
    Rejected {
        code: ParseErrorCode,
        message: String,
        format: Option<String>,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("import task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Rejected { code, .. } => code.code(),
            ImportError::Store(_) => "STORE_ERROR",
            ImportError::Io(_) => "IO_ERROR",
            ImportError::Join(_) => "JOIN_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub id: String,
    pub format_name: String,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct ImportService {
    pub registry: Arc<PassManager>,
    pub store: Arc<PassStore>,
    pub metrics: Arc<Metrics>,
}

impl ImportService {
    pub fn new(registry: PassManager, store: PassStore) -> Self {
        Self {
            registry: Arc::new(registry),
            store: Arc::new(store),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Built-in handlers plus the store configured in `config`
    pub fn from_config(config: &Config) -> Result<Self, ImportError> {
        let registry = PassManager::with_defaults(&config.ingest);
        let store = PassStore::open(&config.store.path)?;
        Ok(Self::new(registry, store))
    }

    /// Parse only; nothing is stored
    pub async fn inspect_file(&self, path: impl Into<PathBuf>) -> Result<ParseOutcome, ImportError> {
        let path = path.into();
        let registry = Arc::clone(&self.registry);
        let outcome = tokio::task::spawn_blocking(move || registry.parse_file(&path)).await?;
        Ok(outcome)
    }

    /// Parse a file and store the resulting pass.
    ///
    /// The stored pass is marked imported and keeps its source path. If the
    /// parsed id is already taken the pass gets a fresh one.
    pub async fn import_file(&self, path: impl Into<PathBuf>) -> Result<ImportReport, ImportError> {
        let path = path.into();
        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);

        let result = tokio::task::spawn_blocking(move || import_blocking(&registry, &store, &path))
            .await
            .map_err(ImportError::from)
            .and_then(|result| result);

        match &result {
            Ok(report) => {
                self.metrics.pass_imported();
                info!(id = %report.id, format = %report.format_name, "pass imported");
            }
            Err(err) => {
                self.metrics.import_failed(err.code());
                warn!(code = err.code(), error = %err, "import failed");
            }
        }
        result
    }

    /// Remove a stored pass. Returns whether it existed.
    pub async fn delete(&self, id: impl Into<String>) -> Result<bool, ImportError> {
        let id = id.into();
        let store = Arc::clone(&self.store);
        let removed = tokio::task::spawn_blocking(move || store.delete(&id)).await??;
        if removed {
            self.metrics.pass_deleted();
        }
        Ok(removed)
    }
}

fn import_blocking(
    registry: &PassManager,
    store: &PassStore,
    path: &Path,
) -> Result<ImportReport, ImportError> {
    // Surface a missing or unreadable file as I/O rather than a parse failure
    std::fs::metadata(path)?;

    let (mut pass, format_name, warnings) = match registry.parse_file(path) {
        ParseOutcome::Success {
            pass,
            format_name,
            warnings,
        } => (pass, format_name, warnings),
        ParseOutcome::Failure {
            message,
            code,
            format_name,
        } => {
            return Err(ImportError::Rejected {
                code,
                message,
                format: format_name,
            });
        }
    };
    pass.imported = true;
    pass.source_path = Some(path.display().to_string());

    let mut attempts = 0;
    loop {
        match store.insert(&pass) {
            Ok(()) => break,
            Err(StoreError::Duplicate(id)) if attempts < MAX_ID_RETRIES => {
                attempts += 1;
                pass.id = generate_pass_id();
                warn!(existing = %id, new = %pass.id, "pass id already stored, assigned a new one");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(ImportReport {
        id: pass.id,
        format_name,
        warnings,
    })
}
