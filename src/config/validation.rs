use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("ingest.mark_limit must be positive")]
    ZeroMarkLimit,

    #[error("ingest.mark_limit ({mark_limit}) exceeds ingest.max_archive_bytes ({max_archive_bytes})")]
    MarkLimitExceedsArchiveLimit {
        mark_limit: u64,
        max_archive_bytes: u64,
    },

    #[error("ingest.pkpass_probe_entries must be at least 1")]
    ZeroProbeEntries,

    #[error("store.path must not be empty")]
    EmptyStorePath,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_ingest(config)?;
    validate_store(config)?;
    Ok(())
}

fn validate_ingest(config: &Config) -> Result<(), ValidationError> {
    let ingest = &config.ingest;

    if ingest.mark_limit.as_u64() == 0 {
        return Err(ValidationError::ZeroMarkLimit);
    }

    if ingest.mark_limit > ingest.max_archive_bytes {
        return Err(ValidationError::MarkLimitExceedsArchiveLimit {
            mark_limit: ingest.mark_limit.as_u64(),
            max_archive_bytes: ingest.max_archive_bytes.as_u64(),
        });
    }

    if ingest.pkpass_probe_entries == 0 {
        return Err(ValidationError::ZeroProbeEntries);
    }

    Ok(())
}

fn validate_store(config: &Config) -> Result<(), ValidationError> {
    if config.store.path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyStorePath);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_mark_limit() {
        let mut config = Config::default();
        config.ingest.mark_limit = ByteSize(0);

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ZeroMarkLimit)));
    }

    #[test]
    fn test_mark_limit_above_archive_limit() {
        let mut config = Config::default();
        config.ingest.mark_limit = ByteSize(32 * 1024 * 1024);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::MarkLimitExceedsArchiveLimit { .. })
        ));
    }

    #[test]
    fn test_zero_probe_entries() {
        let mut config = Config::default();
        config.ingest.pkpass_probe_entries = 0;

        assert!(matches!(validate(&config), Err(ValidationError::ZeroProbeEntries)));
    }

    #[test]
    fn test_empty_store_path() {
        let mut config = Config::default();
        config.store.path = PathBuf::new();

        assert!(matches!(validate(&config), Err(ValidationError::EmptyStorePath)));
    }
}
