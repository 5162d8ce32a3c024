//! Top-level archive parsing: format dispatch, progress, cancellation and
//! detector orchestration.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use crate::config::ParserConfig;
use crate::detect::{DetectorPipeline, DetectorSelection};
use crate::error::ArchiveError;
use crate::model::contact::{CalendarEvent, Contact};
use crate::model::detection::{AccountSignup, Newsletter, Purchase, Subscription};
use crate::model::email::EmailRecord;
use crate::parser::{MboxParser, OlmParser};
use crate::reader::ArchiveSource;

/// Archive container formats the library understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Mbox,
    Olm,
}

/// Pipeline stage reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Extracting,
    ParsingEmails,
    ParsingContacts,
    ParsingCalendar,
    Detecting,
    Complete,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::ParsingEmails => "parsing_emails",
            Self::ParsingContacts => "parsing_contacts",
            Self::ParsingCalendar => "parsing_calendar",
            Self::Detecting => "detecting",
            Self::Complete => "complete",
        }
    }
}

/// One progress report: stage, percentage within [0, 100], message.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub progress: u8,
    pub message: String,
}

/// Progress callback type.
pub type OnProgress<'a> = &'a dyn Fn(ProgressUpdate);

/// Options for [`parse_archive`].
///
/// Detectors are opt-in; contact extraction is on by default for both path
/// and buffer inputs.
pub struct ParseOptions<'a> {
    /// Invoked at stage transitions and at ≥1% steps within a stage.
    pub on_progress: Option<OnProgress<'a>>,
    pub detect_accounts: bool,
    pub detect_purchases: bool,
    pub detect_subscriptions: bool,
    pub detect_newsletters: bool,
    /// Tally a contact per unique sender (default true).
    pub extract_contacts: bool,
    /// Host cancellation flag, checked between chunks and message emits.
    pub cancel: Option<&'a AtomicBool>,
    /// Parser tuning (chunk sizes, guards, yield interval).
    pub config: ParserConfig,
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        Self {
            on_progress: None,
            detect_accounts: false,
            detect_purchases: false,
            detect_subscriptions: false,
            detect_newsletters: false,
            extract_contacts: true,
            cancel: None,
            config: ParserConfig::default(),
        }
    }
}

impl<'a> ParseOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable all four detectors.
    pub fn with_all_detectors(mut self) -> Self {
        self.detect_accounts = true;
        self.detect_purchases = true;
        self.detect_subscriptions = true;
        self.detect_newsletters = true;
        self
    }

    fn selection(&self) -> DetectorSelection {
        DetectorSelection {
            accounts: self.detect_accounts,
            purchases: self.detect_purchases,
            subscriptions: self.detect_subscriptions,
            newsletters: self.detect_newsletters,
        }
    }
}

/// Counters for a completed (or interrupted) parse.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ParseStats {
    /// Records emitted (may be lower than the separator count due to drops).
    pub email_count: u64,
    pub contact_count: u64,
    /// Records dropped by hard checks or the binary guard.
    pub dropped_records: u64,
    pub bytes_read: u64,
    pub elapsed_ms: u64,
}

/// Everything a parse produced, plus the fatal error if one interrupted it.
///
/// On a fatal error the result still carries whatever was extracted up to
/// that point, except for cancellation, where partial results are
/// discarded.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub format: Option<ArchiveFormat>,
    pub emails: Vec<EmailRecord>,
    pub contacts: Vec<Contact>,
    pub calendar_events: Vec<CalendarEvent>,
    pub accounts: Vec<AccountSignup>,
    pub purchases: Vec<Purchase>,
    pub subscriptions: Vec<Subscription>,
    pub newsletters: Vec<Newsletter>,
    pub stats: ParseStats,
    pub error: Option<ArchiveError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(error: ArchiveError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Sniff the container format from magic bytes and structure.
pub fn detect_format(source: &ArchiveSource) -> Option<ArchiveFormat> {
    if OlmParser::is_olm(source) {
        return Some(ArchiveFormat::Olm);
    }
    if MboxParser::is_mbox(source) {
        return Some(ArchiveFormat::Mbox);
    }
    None
}

/// Parse an archive of either format, optionally running the detector
/// pipeline over the extracted emails.
pub fn parse_archive(source: ArchiveSource, options: &ParseOptions<'_>) -> ParseResult {
    let started = Instant::now();
    let reporter = Reporter::new(options.on_progress);

    let format = match detect_format(&source) {
        Some(f) => f,
        None => {
            return ParseResult::failed(ArchiveError::malformed_archive(
                source.label(),
                "unrecognized archive format",
            ))
        }
    };
    debug!(format = ?format, "Detected archive format");

    let mut result = match format {
        ArchiveFormat::Mbox => parse_mbox(source, options, &reporter),
        ArchiveFormat::Olm => parse_olm(source, options, &reporter),
    };
    result.format = Some(format);

    if matches!(result.error, Some(ArchiveError::Cancelled)) {
        // A clean cancelled outcome: no partial records escape.
        return ParseResult {
            format: Some(format),
            error: Some(ArchiveError::Cancelled),
            ..Default::default()
        };
    }

    if result.error.is_none() && options.selection().any() {
        reporter.report(ProgressStage::Detecting, 0, "Running detectors");
        let pipeline = DetectorPipeline::new();
        let detections = pipeline.run(&result.emails, options.selection());
        result.accounts = detections.accounts;
        result.purchases = detections.purchases;
        result.subscriptions = detections.subscriptions;
        result.newsletters = detections.newsletters;
        reporter.report(ProgressStage::Detecting, 100, "Detectors finished");
    }

    result.stats.email_count = result.emails.len() as u64;
    result.stats.contact_count = result.contacts.len() as u64;
    result.stats.elapsed_ms = started.elapsed().as_millis() as u64;

    reporter.report(ProgressStage::Complete, 100, "Archive parsed");
    info!(
        emails = result.stats.email_count,
        dropped = result.stats.dropped_records,
        "Archive parse finished"
    );

    result
}

fn parse_mbox(
    source: ArchiveSource,
    options: &ParseOptions<'_>,
    reporter: &Reporter<'_>,
) -> ParseResult {
    reporter.report(ProgressStage::ParsingEmails, 0, "Parsing MBOX messages");

    let parser = MboxParser::with_config(options.config.clone());
    let mut emails: Vec<EmailRecord> = Vec::new();
    let cancel = options.cancel;

    let progress = |read: u64, total: u64| {
        let pct = if total == 0 {
            100
        } else {
            ((read as f64 / total as f64) * 100.0) as u8
        };
        reporter.report(ProgressStage::ParsingEmails, pct, "Parsing MBOX messages");
    };

    let outcome = parser.stream(source, Some(&progress), &mut |batch| {
        emails.extend(batch);
        !cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    });

    let summary = match outcome {
        Ok(s) => s,
        Err(e) => return ParseResult::failed(e),
    };
    if summary.stopped_early {
        return ParseResult::failed(ArchiveError::Cancelled);
    }

    let mut result = ParseResult {
        stats: ParseStats {
            dropped_records: summary.dropped,
            bytes_read: summary.bytes_read,
            ..Default::default()
        },
        ..Default::default()
    };

    if options.extract_contacts {
        reporter.report(ProgressStage::ParsingContacts, 0, "Extracting contacts");
        result.contacts = contacts_from_emails(&emails);
        reporter.report(ProgressStage::ParsingContacts, 100, "Contacts extracted");
    }

    result.emails = emails;
    result
}

fn parse_olm(
    source: ArchiveSource,
    options: &ParseOptions<'_>,
    reporter: &Reporter<'_>,
) -> ParseResult {
    reporter.report(ProgressStage::Extracting, 0, "Opening OLM container");

    let total = source.len().unwrap_or(0);
    let parser = OlmParser::with_config(options.config.clone());

    reporter.report(ProgressStage::ParsingEmails, 0, "Decoding messages");
    let archive = match parser.parse_with_cancel(source, options.cancel) {
        Ok(a) => a,
        Err(e) => return ParseResult::failed(e),
    };
    reporter.report(ProgressStage::ParsingEmails, 100, "Messages decoded");
    reporter.report(ProgressStage::ParsingContacts, 100, "Contacts extracted");
    reporter.report(ProgressStage::ParsingCalendar, 100, "Calendar extracted");

    ParseResult {
        stats: ParseStats {
            dropped_records: archive.dropped,
            bytes_read: total,
            ..Default::default()
        },
        emails: archive.emails,
        contacts: if options.extract_contacts {
            archive.contacts
        } else {
            Vec::new()
        },
        calendar_events: archive.calendar_events,
        ..Default::default()
    }
}

/// Tally one contact per unique sender across the archive.
pub fn contacts_from_emails(emails: &[EmailRecord]) -> Vec<Contact> {
    let mut contacts: Vec<Contact> = Vec::new();
    for email in emails {
        if let Some(pos) = contacts.iter().position(|c| c.email == email.sender) {
            contacts[pos].record_sighting(email.sender_name.as_deref(), email.date);
        } else {
            contacts.push(Contact::from_sighting(
                &email.sender,
                email.sender_name.as_deref(),
                email.date,
            ));
        }
    }
    contacts
}

/// Deduplicating progress reporter: a stage/percent pair is only delivered
/// when it moved by at least one point.
struct Reporter<'a> {
    callback: Option<OnProgress<'a>>,
    last: Cell<(Option<ProgressStage>, u8)>,
}

impl<'a> Reporter<'a> {
    fn new(callback: Option<OnProgress<'a>>) -> Self {
        Self {
            callback,
            last: Cell::new((None, 0)),
        }
    }

    fn report(&self, stage: ProgressStage, progress: u8, message: &str) {
        let Some(cb) = self.callback else {
            return;
        };
        let progress = progress.min(100);
        let (last_stage, last_pct) = self.last.get();
        if last_stage == Some(stage) && last_pct == progress {
            return;
        }
        self.last.set((Some(stage), progress));
        cb(ProgressUpdate {
            stage,
            progress,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MBOX: &str = "From alice@example.com Thu Jan 04 10:00:00 2024\n\
        From: Alice <alice@example.com>\n\
        Subject: First\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        First body.\n\
        \n\
        From alice@example.com Fri Jan 05 11:00:00 2024\n\
        From: Alice <alice@example.com>\n\
        Subject: Second\n\
        Date: Fri, 05 Jan 2024 11:00:00 +0000\n\
        \n\
        Second body.\n";

    fn buffer(data: &str) -> ArchiveSource {
        ArchiveSource::Buffer(data.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_archive_mbox() {
        let result = parse_archive(buffer(MBOX), &ParseOptions::new());
        assert!(result.is_ok());
        assert_eq!(result.format, Some(ArchiveFormat::Mbox));
        assert_eq!(result.stats.email_count, 2);
        assert_eq!(result.emails.len(), 2);
        // One unique sender, two sightings
        assert_eq!(result.contacts.len(), 1);
        assert_eq!(result.contacts[0].email_count, 2);
    }

    #[test]
    fn test_contacts_can_be_disabled() {
        let options = ParseOptions {
            extract_contacts: false,
            ..ParseOptions::new()
        };
        let result = parse_archive(buffer(MBOX), &options);
        assert!(result.contacts.is_empty());
    }

    #[test]
    fn test_unrecognized_format() {
        let result = parse_archive(buffer("not an archive at all\n"), &ParseOptions::new());
        assert!(matches!(
            result.error,
            Some(ArchiveError::MalformedArchive { .. })
        ));
        assert!(result.emails.is_empty());
    }

    #[test]
    fn test_cancellation_discards_partials() {
        let cancel = AtomicBool::new(true);
        let options = ParseOptions {
            cancel: Some(&cancel),
            config: ParserConfig {
                yield_interval: 1,
                ..ParserConfig::default()
            },
            ..ParseOptions::new()
        };
        let result = parse_archive(buffer(MBOX), &options);
        assert!(matches!(result.error, Some(ArchiveError::Cancelled)));
        assert!(result.emails.is_empty());
        assert!(result.contacts.is_empty());
    }

    #[test]
    fn test_progress_reaches_complete() {
        use std::cell::RefCell;
        let stages: RefCell<Vec<ProgressStage>> = RefCell::new(Vec::new());
        let on_progress = |update: ProgressUpdate| {
            stages.borrow_mut().push(update.stage);
        };
        let options = ParseOptions {
            on_progress: Some(&on_progress),
            detect_newsletters: true,
            ..ParseOptions::new()
        };
        let result = parse_archive(buffer(MBOX), &options);
        assert!(result.is_ok());
        let stages = stages.borrow();
        assert!(stages.contains(&ProgressStage::ParsingEmails));
        assert!(stages.contains(&ProgressStage::Detecting));
        assert_eq!(stages.last(), Some(&ProgressStage::Complete));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(ProgressStage::ParsingEmails.as_str(), "parsing_emails");
        assert_eq!(ProgressStage::Complete.as_str(), "complete");
    }
}
