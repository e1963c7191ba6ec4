use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::model::UnifiedPass;

/// Free-form metadata supplied by the importer (share source, picker, ...)
pub type ImportMetadata = BTreeMap<String, String>;

/// Raw container handed to the registry for one parse call
#[derive(bon::Builder)]
pub struct ImportRequest<R> {
    pub reader: R,
    #[builder(into)]
    pub file_name: Option<String>,
    #[builder(into)]
    pub mime_type: Option<String>,
    #[builder(default)]
    pub metadata: ImportMetadata,
}

impl<R> fmt::Debug for ImportRequest<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRequest")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Failure category of a parse call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorCode {
    /// No handler recognised the input
    UnsupportedFormat,
    /// A handler applied but produced nothing
    ParsingFailed,
    /// The parsed pass is missing required fields
    ValidationFailed,
    /// A handler reported a corrupt container
    ParsingException,
    UnexpectedError,
}

impl ParseErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ParseErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ParseErrorCode::ParsingFailed => "PARSING_FAILED",
            ParseErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ParseErrorCode::ParsingException => "PARSING_EXCEPTION",
            ParseErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of [`PassManager::parse_pass`](super::PassManager::parse_pass).
/// Every exit path of the registry ends in one of these.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Success {
        pass: UnifiedPass,
        format_name: String,
        warnings: Vec<String>,
    },
    Failure {
        message: String,
        code: ParseErrorCode,
        format_name: Option<String>,
    },
}

impl ParseOutcome {
    pub(crate) fn failure(
        code: ParseErrorCode,
        message: impl Into<String>,
        format_name: Option<&str>,
    ) -> Self {
        ParseOutcome::Failure {
            message: message.into(),
            code,
            format_name: format_name.map(str::to_owned),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success { .. })
    }

    pub fn error_code(&self) -> Option<ParseErrorCode> {
        match self {
            ParseOutcome::Failure { code, .. } => Some(*code),
            ParseOutcome::Success { .. } => None,
        }
    }

    pub fn format_name(&self) -> Option<&str> {
        match self {
            ParseOutcome::Success { format_name, .. } => Some(format_name),
            ParseOutcome::Failure { format_name, .. } => format_name.as_deref(),
        }
    }

    pub fn into_pass(self) -> Option<UnifiedPass> {
        match self {
            ParseOutcome::Success { pass, .. } => Some(pass),
            ParseOutcome::Failure { .. } => None,
        }
    }
}
