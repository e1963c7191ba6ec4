use std::io::Read;
use thiserror::Error;

use super::types::ImportMetadata;
use crate::model::{UnifiedPass, ValidationResult};

/// Handler errors
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler recognised the format but the content is corrupt
    #[error("failed to parse {format} pass{}: {message}", file_suffix(.file_name))]
    Parsing {
        format: &'static str,
        file_name: Option<String>,
        message: String,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn file_suffix(file_name: &Option<String>) -> String {
    file_name
        .as_deref()
        .map(|name| format!(" '{}'", name))
        .unwrap_or_default()
}

impl HandlerError {
    pub fn parsing(
        format: &'static str,
        file_name: Option<&str>,
        message: impl std::fmt::Display,
    ) -> Self {
        HandlerError::Parsing {
            format,
            file_name: file_name.map(str::to_owned),
            message: message.to_string(),
        }
    }
}

/// Handler families the registry knows about. PKPass handlers get detection
/// priority; see [`PassManager::register`](super::PassManager::register).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    PkPass,
    GoogleWallet,
    Custom,
}

/// One importable pass container format
///
/// Handlers are synchronous; callers that must not block run the registry on
/// a blocking thread.
pub trait PassFormatHandler: Send + Sync {
    /// Human-readable format name carried in outcomes (e.g. "PKPass")
    fn format_name(&self) -> &'static str;

    fn kind(&self) -> HandlerKind {
        HandlerKind::Custom
    }

    /// Lower-case file extensions without the dot
    fn supported_extensions(&self) -> &'static [&'static str];

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &[]
    }

    /// Decide from the name, MIME type or by peeking at the stream.
    ///
    /// Must not fail: unreadable input is a plain `false`. The caller rewinds
    /// the stream afterwards, so reading from it is allowed.
    fn can_handle(
        &self,
        file_name: Option<&str>,
        mime_type: Option<&str>,
        stream: &mut dyn Read,
    ) -> bool;

    /// Build a pass from the stream, positioned at its start.
    ///
    /// `Ok(None)` means the content held nothing to parse; a corrupt
    /// container is [`HandlerError::Parsing`].
    fn parse_pass(
        &self,
        stream: &mut dyn Read,
        file_name: Option<&str>,
        metadata: &ImportMetadata,
    ) -> Result<Option<UnifiedPass>, HandlerError>;

    /// Pure check of required fields; soft omissions are warnings
    fn validate_pass(&self, pass: &UnifiedPass) -> ValidationResult;

    fn matches_extension(&self, file_name: Option<&str>) -> bool {
        let Some(extension) = file_name.and_then(extension_of) else {
            return false;
        };
        self.supported_extensions()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&extension))
    }

    fn matches_mime_type(&self, mime_type: Option<&str>) -> bool {
        let Some(parsed) = mime_type.and_then(|raw| raw.parse::<mime::Mime>().ok()) else {
            return false;
        };
        self.supported_mime_types()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(parsed.essence_str()))
    }
}

/// Extension of a file name, lower-cased, without the dot
pub fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
