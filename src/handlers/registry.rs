use std::fs::File;
use std::io::{Cursor, Read};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::google_wallet::GoogleWalletHandler;
use super::pkpass::PkPassHandler;
use super::stream::MarkableReader;
use super::traits::{HandlerError, HandlerKind, PassFormatHandler};
use super::types::{ImportRequest, ParseErrorCode, ParseOutcome};
use crate::config::IngestConfig;
use crate::model::ValidationResult;

/// Ordered chain of format handlers
///
/// Detection tries handlers in list order. PKPass handlers always sit at the
/// front of the list: their probe may consume archive bytes, so trying them
/// first keeps rewinds cheap for the common case.
#[derive(Clone)]
pub struct PassManager {
    handlers: Vec<Arc<dyn PassFormatHandler>>,
    mark_limit: usize,
}

impl PassManager {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            handlers: Vec::new(),
            mark_limit: config.mark_limit_bytes(),
        }
    }

    /// Registry with the built-in PKPass and Google Wallet handlers
    pub fn with_defaults(config: &IngestConfig) -> Self {
        let mut manager = Self::new(config);
        manager.register(Arc::new(PkPassHandler::new(config)));
        manager.register(Arc::new(GoogleWalletHandler::new(config)));
        manager
    }

    /// Add a handler. A [`HandlerKind::PkPass`] handler is inserted at the
    /// front regardless of call order; everything else appends.
    pub fn register(&mut self, handler: Arc<dyn PassFormatHandler>) {
        debug!(format = handler.format_name(), "registering pass handler");
        if handler.kind() == HandlerKind::PkPass {
            self.handlers.insert(0, handler);
        } else {
            self.handlers.push(handler);
        }
    }

    pub fn handlers(&self) -> &[Arc<dyn PassFormatHandler>] {
        &self.handlers
    }

    pub fn format_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.format_name()).collect()
    }

    pub fn mark_limit(&self) -> usize {
        self.mark_limit
    }

    /// Pick the first handler that accepts the stream.
    ///
    /// The reader must already be marked. Before each probe the stream is
    /// rewound and re-marked. When a rewind fails (a probe read past the
    /// mark budget) stream probing stops and detection falls back to file
    /// extensions. Never fails; `None` means nothing matched.
    pub fn find_handler<R: Read>(
        &self,
        reader: &mut MarkableReader<R>,
        file_name: Option<&str>,
        mime_type: Option<&str>,
    ) -> Option<Arc<dyn PassFormatHandler>> {
        for handler in &self.handlers {
            if let Err(err) = reader.reset() {
                warn!(
                    error = %err,
                    file = ?file_name,
                    "stream cannot be rewound, detecting by file extension"
                );
                return self.find_by_extension(file_name);
            }
            reader.mark(self.mark_limit);

            let accepted = catch_unwind(AssertUnwindSafe(|| {
                handler.can_handle(file_name, mime_type, &mut *reader)
            }))
            .unwrap_or_else(|_| {
                warn!(format = handler.format_name(), "handler panicked during detection");
                false
            });

            if accepted {
                debug!(format = handler.format_name(), "handler accepted stream");
                return Some(Arc::clone(handler));
            }
        }
        None
    }

    fn find_by_extension(&self, file_name: Option<&str>) -> Option<Arc<dyn PassFormatHandler>> {
        self.handlers
            .iter()
            .find(|handler| handler.matches_extension(file_name))
            .cloned()
    }

    /// Detect, parse and validate one container.
    ///
    /// Every path returns a [`ParseOutcome`]; handler errors and panics are
    /// converted into coded failures.
    pub fn parse_pass<R: Read>(&self, request: ImportRequest<R>) -> ParseOutcome {
        let ImportRequest {
            reader,
            file_name,
            mime_type,
            metadata,
        } = request;
        let file_name = file_name.as_deref();

        let mut reader = MarkableReader::new(reader);
        reader.mark(self.mark_limit);

        let Some(handler) = self.find_handler(&mut reader, file_name, mime_type.as_deref()) else {
            warn!(file = ?file_name, "no handler recognised the input");
            return ParseOutcome::failure(
                ParseErrorCode::UnsupportedFormat,
                "Unsupported pass format",
                None,
            );
        };
        let format = handler.format_name();

        if let Err(err) = reader.reset() {
            warn!(format, error = %err, "cannot rewind stream after detection");
            return ParseOutcome::failure(
                ParseErrorCode::UnexpectedError,
                format!("Stream could not be rewound after detection: {}", err),
                Some(format),
            );
        }

        let parsed = catch_unwind(AssertUnwindSafe(|| {
            handler.parse_pass(&mut reader, file_name, &metadata)
        }));

        let mut pass = match parsed {
            Ok(Ok(Some(pass))) => pass,
            Ok(Ok(None)) => {
                warn!(format, file = ?file_name, "handler produced no pass");
                return ParseOutcome::failure(
                    ParseErrorCode::ParsingFailed,
                    format!("Failed to parse pass with {} handler", format),
                    Some(format),
                );
            }
            Ok(Err(err @ HandlerError::Parsing { .. })) => {
                warn!(format, error = %err, "pass parsing failed");
                return ParseOutcome::failure(
                    ParseErrorCode::ParsingException,
                    err.to_string(),
                    Some(format),
                );
            }
            Ok(Err(err)) => {
                warn!(format, error = %err, "unexpected handler error");
                return ParseOutcome::failure(
                    ParseErrorCode::UnexpectedError,
                    err.to_string(),
                    Some(format),
                );
            }
            Err(_) => {
                warn!(format, "handler panicked while parsing");
                return ParseOutcome::failure(
                    ParseErrorCode::UnexpectedError,
                    format!("{} handler failed unexpectedly", format),
                    Some(format),
                );
            }
        };
        pass.format_name = Some(format.to_string());

        let warnings = match handler.validate_pass(&pass) {
            ValidationResult::Success => Vec::new(),
            ValidationResult::SuccessWithWarnings(warnings) => warnings,
            ValidationResult::Failure(errors) => {
                warn!(format, errors = ?errors, "pass failed validation");
                return ParseOutcome::failure(
                    ParseErrorCode::ValidationFailed,
                    format!("Pass validation failed: {}", errors.join("; ")),
                    Some(format),
                );
            }
        };

        info!(
            format,
            id = %pass.id,
            pass_type = %pass.pass_type,
            warnings = warnings.len(),
            "pass parsed"
        );

        ParseOutcome::Success {
            pass,
            format_name: format.to_string(),
            warnings,
        }
    }

    /// Parse an in-memory container
    pub fn parse_bytes(&self, bytes: &[u8], file_name: Option<&str>) -> ParseOutcome {
        self.parse_pass(
            ImportRequest::builder()
                .reader(Cursor::new(bytes))
                .maybe_file_name(file_name)
                .build(),
        )
    }

    /// Parse a file from disk. The file name doubles as the detection hint
    /// and the resulting pass records the path it came from.
    pub fn parse_file(&self, path: &Path) -> ParseOutcome {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                return ParseOutcome::failure(
                    ParseErrorCode::UnexpectedError,
                    format!("Cannot open {}: {}", path.display(), err),
                    None,
                );
            }
        };

        let file_name = path.file_name().and_then(|name| name.to_str());
        let outcome = self.parse_pass(
            ImportRequest::builder()
                .reader(std::io::BufReader::new(file))
                .maybe_file_name(file_name)
                .build(),
        );

        match outcome {
            ParseOutcome::Success {
                mut pass,
                format_name,
                warnings,
            } => {
                pass.source_path = Some(path.display().to_string());
                ParseOutcome::Success {
                    pass,
                    format_name,
                    warnings,
                }
            }
            failure => failure,
        }
    }
}

impl std::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassManager")
            .field("handlers", &self.format_names())
            .field("mark_limit", &self.mark_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::types::ImportMetadata;
    use crate::model::UnifiedPass;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts everything; records how often it was asked
    struct CatchAll {
        kind: HandlerKind,
        name: &'static str,
        calls: AtomicUsize,
    }

    impl CatchAll {
        fn new(kind: HandlerKind, name: &'static str) -> Self {
            Self {
                kind,
                name,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PassFormatHandler for CatchAll {
        fn format_name(&self) -> &'static str {
            self.name
        }

        fn kind(&self) -> HandlerKind {
            self.kind
        }

        fn supported_extensions(&self) -> &'static [&'static str] {
            &["any"]
        }

        fn can_handle(&self, _: Option<&str>, _: Option<&str>, _: &mut dyn Read) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn parse_pass(
            &self,
            _: &mut dyn Read,
            _: Option<&str>,
            _: &ImportMetadata,
        ) -> Result<Option<UnifiedPass>, HandlerError> {
            Ok(Some(UnifiedPass::new("t", "o")))
        }

        fn validate_pass(&self, _: &UnifiedPass) -> ValidationResult {
            ValidationResult::Success
        }
    }

    enum Fault {
        NoPass,
        Io,
        Panic,
    }

    /// Accepts everything, then fails to parse in the given way
    struct Faulty {
        name: &'static str,
        fault: Fault,
    }

    impl PassFormatHandler for Faulty {
        fn format_name(&self) -> &'static str {
            self.name
        }

        fn supported_extensions(&self) -> &'static [&'static str] {
            &["any"]
        }

        fn can_handle(&self, _: Option<&str>, _: Option<&str>, _: &mut dyn Read) -> bool {
            true
        }

        fn parse_pass(
            &self,
            _: &mut dyn Read,
            _: Option<&str>,
            _: &ImportMetadata,
        ) -> Result<Option<UnifiedPass>, HandlerError> {
            match self.fault {
                Fault::NoPass => Ok(None),
                Fault::Io => Err(HandlerError::Io(std::io::Error::other("disk went away"))),
                Fault::Panic => panic!("{} handler blew up", self.name),
            }
        }

        fn validate_pass(&self, _: &UnifiedPass) -> ValidationResult {
            ValidationResult::Success
        }
    }

    fn manager_with(handler: Faulty) -> PassManager {
        let mut manager = PassManager::new(&IngestConfig::default());
        manager.register(Arc::new(handler));
        manager
    }

    #[test]
    fn test_pkpass_kind_registers_first() {
        let mut manager = PassManager::new(&IngestConfig::default());
        manager.register(Arc::new(CatchAll::new(HandlerKind::Custom, "first")));
        manager.register(Arc::new(CatchAll::new(HandlerKind::Custom, "second")));
        manager.register(Arc::new(CatchAll::new(HandlerKind::PkPass, "pk")));

        assert_eq!(manager.format_names(), vec!["pk", "first", "second"]);
    }

    #[test]
    fn test_default_order() {
        let manager = PassManager::with_defaults(&IngestConfig::default());
        assert_eq!(manager.format_names(), vec!["PKPass", "GoogleWallet"]);
        assert_eq!(manager.mark_limit(), 1024 * 1024);
    }

    #[test]
    fn test_unmarked_reader_falls_back_to_extension() {
        let manager = PassManager::with_defaults(&IngestConfig::default());
        let mut reader = MarkableReader::new(Cursor::new(Vec::new()));

        let handler = manager.find_handler(&mut reader, Some("wallet.gwallet"), None);
        assert_eq!(handler.unwrap().format_name(), "GoogleWallet");

        let none = manager.find_handler(&mut reader, Some("photo.jpg"), None);
        assert!(none.is_none());
    }

    #[test]
    fn test_first_accepting_handler_wins() {
        let first = Arc::new(CatchAll::new(HandlerKind::Custom, "first"));
        let second = Arc::new(CatchAll::new(HandlerKind::Custom, "second"));

        let mut manager = PassManager::new(&IngestConfig::default());
        manager.register(first.clone());
        manager.register(second.clone());

        let outcome = manager.parse_bytes(b"anything", None);
        assert_eq!(outcome.format_name(), Some("first"));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_registry_is_unsupported() {
        let manager = PassManager::new(&IngestConfig::default());
        let outcome = manager.parse_bytes(b"{}", Some("x.json"));
        assert_eq!(outcome.error_code(), Some(ParseErrorCode::UnsupportedFormat));
        assert_eq!(outcome.format_name(), None);
    }

    #[test]
    fn test_parse_file_missing_path() {
        let manager = PassManager::with_defaults(&IngestConfig::default());
        let outcome = manager.parse_file(Path::new("/definitely/not/here.pkpass"));
        assert_eq!(outcome.error_code(), Some(ParseErrorCode::UnexpectedError));
    }

    #[test]
    fn test_handler_without_pass_is_parsing_failed() {
        let manager = manager_with(Faulty {
            name: "Empty",
            fault: Fault::NoPass,
        });

        let outcome = manager.parse_bytes(b"anything", Some("x.any"));
        assert_eq!(outcome.error_code(), Some(ParseErrorCode::ParsingFailed));
        assert_eq!(outcome.format_name(), Some("Empty"));
    }

    #[test]
    fn test_panicking_parser_is_unexpected_error() {
        let manager = manager_with(Faulty {
            name: "Explosive",
            fault: Fault::Panic,
        });

        let outcome = manager.parse_bytes(b"anything", None);
        assert_eq!(outcome.error_code(), Some(ParseErrorCode::UnexpectedError));
        assert_eq!(outcome.format_name(), Some("Explosive"));
    }

    #[test]
    fn test_handler_io_error_is_unexpected_error() {
        let manager = manager_with(Faulty {
            name: "Flaky",
            fault: Fault::Io,
        });

        let outcome = manager.parse_bytes(b"anything", None);
        assert_eq!(outcome.error_code(), Some(ParseErrorCode::UnexpectedError));
        assert_eq!(outcome.format_name(), Some("Flaky"));
        match outcome {
            ParseOutcome::Failure { message, .. } => assert!(message.contains("disk went away")),
            success => panic!("expected failure, got {:?}", success),
        }
    }

    #[test]
    fn test_corrupt_pass_json_is_parsing_exception() {
        use std::io::Write;
        use zip::write::{FileOptions, ZipWriter};

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("pass.json", FileOptions::default()).unwrap();
        writer.write_all(b"{ \"serialNumber\": ").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let manager = PassManager::with_defaults(&IngestConfig::default());
        let outcome = manager.parse_bytes(&bytes, Some("broken.pkpass"));
        assert_eq!(outcome.error_code(), Some(ParseErrorCode::ParsingException));
        assert_eq!(outcome.format_name(), Some("PKPass"));
    }
}
