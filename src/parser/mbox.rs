//! Streaming MBOX parser.
//!
//! Consumes chunks from a [`ChunkedReader`] and splits them into message
//! blocks on `From ` separator lines, then hands each block to the MIME
//! walker. Never holds more than one chunk plus one in-flight message in
//! memory. Tolerant of malformed input: a bad record is dropped, the stream
//! continues.

use tracing::warn;

use crate::config::ParserConfig;
use crate::error::Result;
use crate::model::email::EmailRecord;
use crate::reader::{ArchiveSource, ChunkedReader};

use super::{labels, mime};

/// Day-of-week tokens required in a valid separator line. The `From ` prefix
/// alone produces false positives on messages quoting other emails.
const DAY_TOKENS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Progress callback: `(bytes_read, total_bytes)`.
pub type ProgressFn<'a> = &'a dyn Fn(u64, u64);

/// Batch callback: receives records in source order, returns `true` to
/// continue or `false` to stop early.
pub type BatchFn<'a> = &'a mut dyn FnMut(Vec<EmailRecord>) -> bool;

/// Outcome counters for a streaming pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamSummary {
    /// Records emitted to the caller.
    pub emitted: u64,
    /// Blocks dropped by hard checks or the binary guard.
    pub dropped: u64,
    /// Raw bytes consumed.
    pub bytes_read: u64,
    /// Whether the caller stopped the stream early.
    pub stopped_early: bool,
}

/// Streaming MBOX parser.
pub struct MboxParser {
    config: ParserConfig,
}

impl Default for MboxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MboxParser {
    /// Create a parser with default tuning.
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
        }
    }

    /// Create a parser with explicit tuning.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Sniff whether a source looks like an MBOX: the first non-empty line
    /// must be a valid `From ` separator.
    pub fn is_mbox(source: &ArchiveSource) -> bool {
        let Ok(head) = source.head(4096) else {
            return false;
        };
        let text = String::from_utf8_lossy(&head);
        let text = text.trim_start_matches('\u{FEFF}');
        text.lines()
            .find(|l| !l.trim().is_empty())
            .is_some_and(is_separator_line)
    }

    /// Parse an `X-Gmail-Labels` header value into normalized labels.
    pub fn parse_gmail_labels(header_value: &str) -> Vec<String> {
        labels::parse_gmail_labels(header_value)
    }

    /// Map an `X-Gmail-Labels` header value to canonical folder ids.
    pub fn folder_ids_from_labels(header_value: &str) -> Vec<String> {
        labels::folder_ids_from_labels(header_value)
    }

    /// Parse the full archive into a vector of records.
    pub fn parse(&self, source: ArchiveSource) -> Result<Vec<EmailRecord>> {
        let mut emails = Vec::new();
        self.stream(source, None, &mut |batch| {
            emails.extend(batch);
            true
        })?;
        Ok(emails)
    }

    /// Parse the archive, delivering records in batches.
    ///
    /// Batches are sized to the configured yield interval so hosts can
    /// repaint between them; the concatenation of all batches equals
    /// [`MboxParser::parse`] output, in the same order. Returns the total
    /// number of records emitted.
    pub fn parse_streaming(
        &self,
        source: ArchiveSource,
        on_progress: Option<ProgressFn<'_>>,
        on_batch: BatchFn<'_>,
    ) -> Result<u64> {
        let summary = self.stream(source, on_progress, on_batch)?;
        Ok(summary.emitted)
    }

    /// Core streaming pass: split, walk, batch.
    pub fn stream(
        &self,
        source: ArchiveSource,
        on_progress: Option<ProgressFn<'_>>,
        on_batch: BatchFn<'_>,
    ) -> Result<StreamSummary> {
        let mut reader = ChunkedReader::open(source, &self.config)?;
        let total = reader.total_size();
        let batch_size = self.config.yield_interval.max(1);

        let mut summary = StreamSummary::default();
        let mut batch: Vec<EmailRecord> = Vec::with_capacity(batch_size);
        let mut leftover = String::new();

        macro_rules! flush_batch {
            () => {
                if !batch.is_empty() {
                    let outgoing = std::mem::take(&mut batch);
                    if !on_batch(outgoing) {
                        summary.stopped_early = true;
                        summary.bytes_read = reader.bytes_read();
                        return Ok(summary);
                    }
                }
            };
        }

        while let Some(chunk) = reader.next_chunk()? {
            if leftover.is_empty() {
                leftover = chunk;
            } else {
                leftover.push_str(&chunk);
            }

            // Reverse scan: everything before the last confirmed separator is
            // flushable; the rest carries into the next chunk.
            if let Some(last_sep) = find_last_separator(&leftover) {
                if last_sep > 0 {
                    let rest = leftover.split_off(last_sep);
                    let flushable = std::mem::replace(&mut leftover, rest);
                    for block in split_messages(&flushable) {
                        self.handle_block(block, &mut summary, &mut batch);
                        if batch.len() >= batch_size {
                            flush_batch!();
                        }
                    }
                }
            }

            // Pathological single message: emit early rather than buffering
            // without bound.
            if leftover.len() > self.config.max_message_size {
                warn!(
                    size = leftover.len(),
                    max = self.config.max_message_size,
                    "Message exceeds maximum size, emitting early"
                );
                let oversized = std::mem::take(&mut leftover);
                self.handle_block(&oversized, &mut summary, &mut batch);
                flush_batch!();
            }

            if let Some(cb) = on_progress {
                cb(reader.bytes_read(), total);
            }
        }

        // Final chunk: everything flushes.
        if !leftover.trim().is_empty() {
            for block in split_messages(&leftover) {
                self.handle_block(block, &mut summary, &mut batch);
                if batch.len() >= batch_size {
                    flush_batch!();
                }
            }
        }

        flush_batch!();

        summary.bytes_read = reader.bytes_read();
        if let Some(cb) = on_progress {
            cb(summary.bytes_read, total);
        }

        Ok(summary)
    }

    fn handle_block(&self, block: &str, summary: &mut StreamSummary, batch: &mut Vec<EmailRecord>) {
        match mime::parse_message_block(block, &self.config) {
            Some(record) => {
                summary.emitted += 1;
                batch.push(record);
            }
            None => {
                summary.dropped += 1;
            }
        }
    }
}

/// Check whether a line is a valid MBOX separator: `From ` prefix plus a
/// day-of-week token somewhere in the line.
pub fn is_separator_line(line: &str) -> bool {
    line.starts_with("From ") && DAY_TOKENS.iter().any(|d| line.contains(d))
}

/// Byte offset of the start of the last separator line, if any.
fn find_last_separator(text: &str) -> Option<usize> {
    let mut cur_end = text.len();
    loop {
        let line_start = match text[..cur_end].rfind('\n') {
            Some(p) => p + 1,
            None => 0,
        };
        if is_separator_line(&text[line_start..cur_end]) {
            return Some(line_start);
        }
        if line_start == 0 {
            return None;
        }
        cur_end = line_start - 1;
    }
}

/// Split flushed text into message blocks, one per separator line.
///
/// Content before the first separator (an MBOX preamble, or a bogus `From `
/// line without a day token) is not a message and is skipped.
fn split_messages(text: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut line_start = 0;
    for (pos, _) in text.match_indices('\n') {
        let line = &text[line_start..pos];
        if is_separator_line(line) {
            starts.push(line_start);
        }
        line_start = pos + 1;
    }
    if line_start < text.len() && is_separator_line(&text[line_start..]) {
        starts.push(line_start);
    }

    let mut blocks = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        blocks.push(&text[start..end]);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_MESSAGES: &str = "From alice@example.com Thu Jan 04 10:00:00 2024\n\
        From: Alice <alice@example.com>\n\
        Subject: First\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        First body.\n\
        \n\
        From bob@example.com Fri Jan 05 11:00:00 2024\n\
        From: Bob <bob@example.com>\n\
        Subject: Second\n\
        Date: Fri, 05 Jan 2024 11:00:00 +0000\n\
        \n\
        Second body.\n";

    fn parse_buffer(data: &str) -> Vec<EmailRecord> {
        MboxParser::new()
            .parse(ArchiveSource::Buffer(data.as_bytes().to_vec()))
            .unwrap()
    }

    #[test]
    fn test_is_separator_line() {
        assert!(is_separator_line(
            "From user@example.com Thu Jan 01 00:00:00 2024"
        ));
        assert!(!is_separator_line("from user@example.com Thu Jan 01"));
        assert!(!is_separator_line(">From user@example.com Thu Jan 01"));
        // Prefix alone is not enough
        assert!(!is_separator_line("From my point of view"));
        assert!(is_separator_line("From my point of view on Monday"));
    }

    #[test]
    fn test_parse_two_messages() {
        let emails = parse_buffer(TWO_MESSAGES);
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].sender, "alice@example.com");
        assert_eq!(emails[0].subject, "First");
        assert_eq!(emails[1].sender, "bob@example.com");
        assert!(emails[1].body.contains("Second body."));
    }

    #[test]
    fn test_from_line_without_day_token_is_body() {
        let data = "From alice@example.com Thu Jan 04 10:00:00 2024\n\
            From: Alice <alice@example.com>\n\
            Subject: Quoting\n\
            \n\
            From the archives:\n\
            a quoted line.\n";
        let emails = parse_buffer(data);
        assert_eq!(emails.len(), 1);
        assert!(emails[0].body.contains("From the archives:"));
    }

    #[test]
    fn test_leading_invalid_separator_is_skipped() {
        // First "From " line lacks a day token: not a separator, and with no
        // prior separator the preamble is not a message.
        let data = "From nobody in particular\n\
            stray preamble\n\
            From bob@example.com Fri Jan 05 11:00:00 2024\n\
            From: Bob <bob@example.com>\n\
            Subject: Only\n\
            \n\
            Body.\n";
        let emails = parse_buffer(data);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "Only");
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_buffer("").is_empty());
    }

    #[test]
    fn test_malformed_record_does_not_abort() {
        let data = "From x Thu Jan 04 10:00:00 2024\n\
            Subject-only-no-colon-line\n\
            \n\
            \n\
            From bob@example.com Fri Jan 05 11:00:00 2024\n\
            From: Bob <bob@example.com>\n\
            Subject: Survivor\n\
            \n\
            Body.\n";
        let emails = parse_buffer(data);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "Survivor");
    }

    #[test]
    fn test_chunking_invariance() {
        let reference = parse_buffer(TWO_MESSAGES);
        for chunk in [1usize, 3, 7, 16, 64, 4096] {
            let parser = MboxParser::with_config(ParserConfig {
                file_chunk_size: chunk,
                buffer_chunk_size: chunk,
                ..ParserConfig::default()
            });
            let emails = parser
                .parse(ArchiveSource::Buffer(TWO_MESSAGES.as_bytes().to_vec()))
                .unwrap();
            assert_eq!(emails.len(), reference.len(), "chunk size {chunk}");
            for (a, b) in emails.iter().zip(&reference) {
                assert_eq!(a.subject, b.subject);
                assert_eq!(a.sender, b.sender);
                assert_eq!(a.body, b.body);
            }
        }
    }

    #[test]
    fn test_streaming_equals_parse() {
        let parser = MboxParser::with_config(ParserConfig {
            yield_interval: 1,
            ..ParserConfig::default()
        });
        let mut streamed: Vec<EmailRecord> = Vec::new();
        let total = parser
            .parse_streaming(
                ArchiveSource::Buffer(TWO_MESSAGES.as_bytes().to_vec()),
                None,
                &mut |batch| {
                    streamed.extend(batch);
                    true
                },
            )
            .unwrap();
        let whole = parse_buffer(TWO_MESSAGES);
        assert_eq!(total, whole.len() as u64);
        assert_eq!(streamed.len(), whole.len());
        for (a, b) in streamed.iter().zip(&whole) {
            assert_eq!(a.subject, b.subject);
            assert_eq!(a.sender, b.sender);
        }
    }

    #[test]
    fn test_batch_callback_stops_early() {
        let parser = MboxParser::with_config(ParserConfig {
            yield_interval: 1,
            ..ParserConfig::default()
        });
        let mut seen = 0;
        let total = parser
            .parse_streaming(
                ArchiveSource::Buffer(TWO_MESSAGES.as_bytes().to_vec()),
                None,
                &mut |batch| {
                    seen += batch.len();
                    false
                },
            )
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_is_mbox_sniffing() {
        assert!(MboxParser::is_mbox(&ArchiveSource::Buffer(
            TWO_MESSAGES.as_bytes().to_vec()
        )));
        assert!(!MboxParser::is_mbox(&ArchiveSource::Buffer(
            b"PK\x03\x04zipdata".to_vec()
        )));
        assert!(!MboxParser::is_mbox(&ArchiveSource::Buffer(
            b"From nobody without a day token\n".to_vec()
        )));
    }

    #[test]
    fn test_crlf_input_normalized() {
        let data = TWO_MESSAGES.replace('\n', "\r\n");
        let emails = parse_buffer(&data);
        assert_eq!(emails.len(), 2);
        assert!(emails[0].body.contains("First body."));
    }
}
