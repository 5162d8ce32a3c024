//! End-to-end tests for `parse_archive`: format dispatch, OLM decoding,
//! the binary guard, progress and cancellation.

use std::io::{Cursor, Write};

use mailsift::archive::{parse_archive, ArchiveFormat, ParseOptions};
use mailsift::detect::AccountDetector;
use mailsift::error::ArchiveError;
use mailsift::reader::ArchiveSource;

fn buffer(data: &str) -> ArchiveSource {
    ArchiveSource::Buffer(data.as_bytes().to_vec())
}

fn build_olm(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

// ─── OLM end to end: Netflix welcome mail → account detection ───────

#[test]
fn test_olm_netflix_account_detection() {
    let message = r#"<?xml version="1.0" encoding="UTF-8"?>
<email>
  <OPFMessageCopySubject>Welcome to Netflix!</OPFMessageCopySubject>
  <OPFMessageCopySentTime>2024-02-01T10:00:00Z</OPFMessageCopySentTime>
  <OPFMessageCopyBody>Thanks for signing up. Your account has been created.</OPFMessageCopyBody>
  <OPFMessageCopyFromAddresses>
    <emailAddress OPFContactEmailAddressAddress="welcome@netflix.com" OPFContactEmailAddressName="Netflix"/>
  </OPFMessageCopyFromAddresses>
</email>"#;
    let olm = build_olm(&[("com.microsoft.__Messages/message_1.xml", message)]);

    let options = ParseOptions {
        detect_accounts: true,
        ..ParseOptions::new()
    };
    let result = parse_archive(ArchiveSource::Buffer(olm), &options);

    assert!(result.is_ok());
    assert_eq!(result.format, Some(ArchiveFormat::Olm));
    assert_eq!(result.emails.len(), 1);
    assert_eq!(result.emails[0].sender, "welcome@netflix.com");
    assert_eq!(result.emails[0].folder_id, "inbox");

    assert_eq!(result.accounts.len(), 1);
    let account = &result.accounts[0];
    assert_eq!(account.service_name, "Netflix");
    assert_eq!(account.service_type.as_str(), "streaming");

    // Confidence on the underlying detection is at least 80
    let detection = AccountDetector::new().detect(&result.emails[0]).unwrap();
    assert!(detection.confidence >= 80);
}

// ─── MBOX dispatch and stats ────────────────────────────────────────

#[test]
fn test_mbox_dispatch_and_stats() {
    let mbox = "From a@b.com Thu Jan 04 10:00:00 2024\n\
        From: a@b.com\n\
        Subject: Hi\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        Hello.\n";
    let result = parse_archive(buffer(mbox), &ParseOptions::new());
    assert_eq!(result.format, Some(ArchiveFormat::Mbox));
    assert_eq!(result.stats.email_count, 1);
    assert_eq!(result.stats.dropped_records, 0);
    assert!(result.stats.bytes_read > 0);
}

// ─── Seed: first From line without a day token is not a separator ───

#[test]
fn test_invalid_first_separator() {
    let mbox = "From somebody at large\n\
        stray line\n\
        From real@example.com Thu Jan 04 10:00:00 2024\n\
        From: real@example.com\n\
        Subject: Genuine\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        Body.\n";
    let result = parse_archive(buffer(mbox), &ParseOptions::new());
    assert_eq!(result.stats.email_count, 1);
    assert_eq!(result.emails[0].subject, "Genuine");
}

// ─── Seed: base64-JPEG body under a placeholder subject is dropped ──

#[test]
fn test_binary_guard_drops_record() {
    let jpeg_noise = "/9j/".to_string() + &"4AAQSkZJRgABAQAAAQ".repeat(11);
    let mbox = format!(
        "From cam@example.com Thu Jan 04 10:00:00 2024\n\
         From: cam@example.com\n\
         Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
         \n\
         {jpeg_noise}\n\
         \n\
         From real@example.com Fri Jan 05 11:00:00 2024\n\
         From: real@example.com\n\
         Subject: Still here\n\
         Date: Fri, 05 Jan 2024 11:00:00 +0000\n\
         \n\
         Normal text.\n"
    );
    let result = parse_archive(buffer(&mbox), &ParseOptions::new());
    assert_eq!(result.stats.email_count, 1);
    assert_eq!(result.stats.dropped_records, 1);
    assert_eq!(result.emails[0].subject, "Still here");
}

// ─── Unreadable path surfaces SourceUnavailable ─────────────────────

#[test]
fn test_missing_file() {
    let result = parse_archive(
        ArchiveSource::Path("/no/such/archive.mbox".into()),
        &ParseOptions::new(),
    );
    assert!(result.error.is_some());
    assert!(result.emails.is_empty());
}

// ─── Cancellation: clean outcome, no partial records ────────────────

#[test]
fn test_cancellation() {
    use std::sync::atomic::AtomicBool;

    let mbox = "From a@b.com Thu Jan 04 10:00:00 2024\n\
        From: a@b.com\nSubject: One\n\n1\n\n\
        From a@b.com Fri Jan 05 10:00:00 2024\n\
        From: a@b.com\nSubject: Two\n\n2\n";

    let cancel = AtomicBool::new(true);
    let options = ParseOptions {
        cancel: Some(&cancel),
        detect_newsletters: true,
        ..ParseOptions::new()
    };
    let result = parse_archive(buffer(mbox), &options);
    assert!(matches!(result.error, Some(ArchiveError::Cancelled)));
    assert!(result.emails.is_empty());
    assert!(result.newsletters.is_empty());
}

// ─── Progress percentages stay within [0, 100] and hit 100 ─────────

#[test]
fn test_progress_bounds() {
    use std::cell::RefCell;

    let mbox = "From a@b.com Thu Jan 04 10:00:00 2024\n\
        From: a@b.com\nSubject: Hi\n\nHello.\n";
    let updates: RefCell<Vec<u8>> = RefCell::new(Vec::new());
    let on_progress = |update: mailsift::archive::ProgressUpdate| {
        updates.borrow_mut().push(update.progress);
    };
    let options = ParseOptions {
        on_progress: Some(&on_progress),
        ..ParseOptions::new()
    };
    let result = parse_archive(buffer(mbox), &options);
    assert!(result.is_ok());
    let updates = updates.borrow();
    assert!(updates.iter().all(|&p| p <= 100));
    assert_eq!(updates.last(), Some(&100));
}
