//! `mailsift`: turn personal email archives into a structured dataset.
//!
//! This crate parses MBOX spools (including Gmail Takeout exports) and
//! Outlook-for-Mac OLM containers of any size into normalized email records,
//! then classifies the archive's contents with four rule-based detectors:
//! service sign-ups, purchases, subscriptions and newsletters.
//!
//! The streaming parsers never hold a whole archive in memory, recover from
//! malformed records without aborting, and report progress through host
//! callbacks. Classification is deterministic: pattern catalogs and scoring
//! weights, no learned models.

pub mod archive;
pub mod config;
pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod reader;

pub use archive::{
    detect_format, parse_archive, ArchiveFormat, ParseOptions, ParseResult, ParseStats,
    ProgressStage, ProgressUpdate,
};
pub use detect::{
    AccountDetector, DetectorPipeline, MailCategory, NewsletterDetector, PurchaseDetector,
    SubscriptionDetector,
};
pub use error::{ArchiveError, Result};
pub use model::email::EmailRecord;
pub use parser::{MboxParser, OlmParser};
pub use reader::ArchiveSource;
