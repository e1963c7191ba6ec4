//! Pass format ingestion
//!
//! This module turns an arbitrary input stream into a [`UnifiedPass`](crate::model::UnifiedPass).
//!
//! ## Key Components
//!
//! - [`PassFormatHandler`] - Trait implemented by each container format
//! - [`PkPassHandler`] - Apple Wallet `.pkpass` zip archives
//! - [`GoogleWalletHandler`] - Google Wallet class/object JSON exports
//! - [`PassManager`] - Ordered handler chain: detection, parsing, validation
//! - [`MarkableReader`] - Rewindable wrapper used during detection
//! - [`ParseOutcome`] - Value-typed result of every parse call
//!
//! ## Example
//!
//! ```rust,ignore
//! use passvault::config::IngestConfig;
//! use passvault::handlers::{ImportRequest, ParseOutcome, PassManager};
//!
//! let manager = PassManager::with_defaults(&IngestConfig::default());
//! let request = ImportRequest::builder()
//!     .reader(std::fs::File::open("boarding.pkpass")?)
//!     .file_name("boarding.pkpass")
//!     .build();
//!
//! match manager.parse_pass(request) {
//!     ParseOutcome::Success { pass, warnings, .. } => println!("{} ({:?})", pass.title, warnings),
//!     ParseOutcome::Failure { message, code, .. } => eprintln!("{}: {}", code, message),
//! }
//! ```

mod dates;
mod google_wallet;
mod pkpass;
mod registry;
mod stream;
mod traits;
pub(crate) mod types;

pub use dates::parse_timestamp;
pub use google_wallet::GoogleWalletHandler;
pub use pkpass::{PASS_JSON, PkPassHandler};
pub use registry::PassManager;
pub use stream::MarkableReader;
pub use traits::{HandlerError, HandlerKind, PassFormatHandler, extension_of};
pub use types::{ImportMetadata, ImportRequest, ParseErrorCode, ParseOutcome};
