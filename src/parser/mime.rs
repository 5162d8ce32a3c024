//! MIME walker: turns a raw message block into a normalized [`EmailRecord`].
//!
//! Handles header folding, recursive multipart traversal, quoted-printable
//! and base64 transfer decoding, part selection (first `text/plain` wins the
//! body, first `text/html` wins the HTML body) and the binary-content guard
//! that drops records whose text stream is actually a leaked attachment.
//!
//! Unknown or multi-valued `Content-Transfer-Encoding` values are passed
//! through undecoded; the record is kept and the host sees the raw text.

use tracing::warn;

use crate::config::ParserConfig;
use crate::model::address::EmailAddress;
use crate::model::email::{AttachmentMeta, EmailRecord, NO_SUBJECT, SIZE_CAP};

use super::header::{
    charset_to_utf8, decode_base64_forgiving, decode_encoded_words, first_angle_token, get_header,
    parse_date, unfold_headers,
};
use super::labels;
use super::thread::derive_thread_id;

/// Maximum depth for recursive multipart parsing, against adversarial nesting.
const MAX_DEPTH: usize = 10;

/// Minimum printable characters for the raw-body fallback to fire.
const FALLBACK_MIN_PRINTABLE: usize = 20;

/// Decoded content collected while walking a message's parts.
#[derive(Default)]
struct PartContent {
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<AttachmentMeta>,
    has_attachments: bool,
}

/// Parse one raw message block (with or without its leading `From ` line)
/// into a record.
///
/// Returns `None` when the record fails a hard check: no usable sender, no
/// subject and no sender, or a binary-looking body under a placeholder
/// subject. Failures are logged and never abort the surrounding archive.
pub fn parse_message_block(block: &str, config: &ParserConfig) -> Option<EmailRecord> {
    let message = skip_from_line(block);

    let (header_text, body_text) = split_headers(message);
    let headers = unfold_headers(header_text);

    let subject = match get_header(&headers, "subject") {
        Some(raw) if !raw.trim().is_empty() => decode_encoded_words(raw.trim()),
        _ => NO_SUBJECT.to_string(),
    };

    let from = EmailAddress::parse(&decode_encoded_words(
        get_header(&headers, "from").unwrap_or_default(),
    ));

    if from.address.is_empty() && subject == NO_SUBJECT {
        warn!("Dropping record without sender or subject");
        return None;
    }
    if !from.is_valid() {
        warn!(sender = %from.address, "Dropping record with unusable sender");
        return None;
    }

    let mut recipients: Vec<String> = Vec::new();
    for name in ["to", "cc"] {
        if let Some(raw) = get_header(&headers, name) {
            let decoded = decode_encoded_words(raw);
            recipients.extend(EmailAddress::parse_list(&decoded).into_iter().map(|a| a.address));
        }
    }

    let date = get_header(&headers, "date")
        .and_then(parse_date)
        .unwrap_or_else(chrono::Utc::now);

    let message_id = get_header(&headers, "message-id").and_then(|raw| {
        first_angle_token(raw).or_else(|| {
            let bare = raw.trim();
            (!bare.is_empty()).then(|| bare.to_string())
        })
    });

    // Walk the MIME tree
    let mut content = PartContent::default();
    walk_part(&headers, body_text, 0, &mut content);

    let mut body = content.text.unwrap_or_default();
    let html_body = content.html;

    // Raw fallback: malformed MIME sometimes leaves visible content outside
    // any decodable part.
    if body.is_empty() && html_body.is_none() {
        if let Some(fallback) = raw_body_fallback(body_text) {
            body = fallback;
        }
    }

    // Derive a plain-text body from HTML when no text/plain part existed
    if body.trim().is_empty() {
        if let Some(ref html) = html_body {
            body = html_to_text(html);
        }
    }

    if looks_binary(&body, config.binary_guard_threshold) {
        if subject == NO_SUBJECT {
            warn!("Dropping record: binary body under placeholder subject");
            return None;
        }
        // Subject is real; salvage the record without the corrupt body.
        warn!(subject = %subject, "Discarding binary-looking body");
        body = String::new();
    }

    if body.is_empty() && html_body.is_none() && subject == NO_SUBJECT {
        warn!("Dropping record with no content and no subject");
        return None;
    }

    let gmail_labels = get_header(&headers, "x-gmail-labels").map(labels::parse_gmail_labels);
    let (folder_id, is_read, is_starred) = match &gmail_labels {
        Some(l) => (
            labels::folder_id_from_labels(l),
            labels::is_read(l),
            labels::is_starred(l),
        ),
        None => ("archive".to_string(), true, false),
    };

    let thread_id = derive_thread_id(&headers, &subject);

    Some(EmailRecord {
        subject,
        sender: from.address,
        sender_name: (!from.display_name.is_empty()).then_some(from.display_name),
        recipients,
        date,
        body,
        html_body,
        size: block.len().min(SIZE_CAP),
        is_read,
        is_starred,
        folder_id,
        labels: gmail_labels,
        thread_id,
        message_id,
        has_attachments: content.has_attachments,
        attachments: content.attachments,
    })
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &str) -> &str {
    let data = data.strip_prefix('\u{FEFF}').unwrap_or(data);
    if data.starts_with("From ") {
        if let Some(pos) = data.find('\n') {
            return &data[pos + 1..];
        }
        return "";
    }
    data
}

/// Split a message into header text and body at the first empty line.
fn split_headers(message: &str) -> (&str, &str) {
    match message.find("\n\n") {
        Some(pos) => (&message[..pos], &message[pos + 2..]),
        None => (message, ""),
    }
}

/// Recursive multipart descent. Non-multipart parts are decoded and offered
/// to the part-selection policy.
fn walk_part(headers: &[(String, String)], body: &str, depth: usize, out: &mut PartContent) {
    if depth > MAX_DEPTH {
        warn!(depth, "Multipart nesting too deep, skipping subtree");
        return;
    }

    let content_type_raw = get_header(headers, "content-type").unwrap_or("text/plain");
    let (mime_type, params) = parse_content_type(content_type_raw);

    if mime_type.starts_with("multipart/") {
        let Some(boundary) = params.iter().find(|(k, _)| k == "boundary").map(|(_, v)| v) else {
            warn!(content_type = %mime_type, "Multipart without boundary");
            return;
        };
        for part in split_multipart(body, boundary) {
            let (part_header_text, part_body) = split_headers(part);
            let part_headers = unfold_headers(part_header_text);
            walk_part(&part_headers, part_body, depth + 1, out);
        }
        return;
    }

    // Attachment? Record metadata only; never select as body.
    let disposition = get_header(headers, "content-disposition").unwrap_or("");
    if disposition.trim().to_lowercase().starts_with("attachment") {
        out.has_attachments = true;
        let (_, disp_params) = parse_content_type(disposition);
        let filename = disp_params
            .iter()
            .find(|(k, _)| k == "filename")
            .map(|(_, v)| v.clone())
            .or_else(|| {
                params
                    .iter()
                    .find(|(k, _)| k == "name")
                    .map(|(_, v)| v.clone())
            })
            .unwrap_or_else(|| format!("attachment_{}", out.attachments.len()));
        out.attachments.push(AttachmentMeta {
            filename,
            content_type: mime_type,
            size: body.len(),
        });
        return;
    }

    let charset = params
        .iter()
        .find(|(k, _)| k == "charset")
        .map(|(_, v)| v.as_str())
        .unwrap_or("utf-8");
    let encoding = get_header(headers, "content-transfer-encoding").unwrap_or("7bit");

    match mime_type.as_str() {
        "text/plain" if out.text.is_none() => {
            out.text = Some(decode_transfer_encoding(body, encoding, charset));
        }
        "text/html" if out.html.is_none() => {
            out.html = Some(decode_transfer_encoding(body, encoding, charset));
        }
        _ => {}
    }
}

/// Split a multipart body into its parts, dropping preamble and epilogue.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        let line_start = offset;
        offset += line.len();

        if trimmed == closing {
            if let Some(start) = current_start.take() {
                parts.push(&body[start..line_start]);
            }
            break;
        }
        if trimmed == delimiter {
            if let Some(start) = current_start.take() {
                parts.push(&body[start..line_start]);
            }
            current_start = Some(offset);
        }
    }

    // Unterminated multipart: flush the trailing part
    if let Some(start) = current_start {
        parts.push(&body[start..]);
    }

    parts
}

/// Parse a `Content-Type`-shaped value into `(lowercased type, parameters)`.
///
/// Boundary and other parameter values may be double-quoted, single-quoted
/// or bare.
pub fn parse_content_type(value: &str) -> (String, Vec<(String, String)>) {
    let mut segments = value.split(';');
    let mime_type = segments.next().unwrap_or("").trim().to_lowercase();

    let mut params = Vec::new();
    for segment in segments {
        if let Some((key, raw)) = segment.split_once('=') {
            let key = key.trim().to_lowercase();
            let raw = raw.trim();
            let value = raw
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                .unwrap_or(raw);
            params.push((key, value.to_string()));
        }
    }

    (mime_type, params)
}

/// Decode a part body per its `Content-Transfer-Encoding`.
///
/// `7bit`, `8bit`, `binary` and anything unrecognized (including
/// multi-valued oddities) pass through undecoded.
pub fn decode_transfer_encoding(body: &str, encoding: &str, charset: &str) -> String {
    match encoding.trim().to_lowercase().as_str() {
        "quoted-printable" => {
            let bytes = decode_quoted_printable(body);
            charset_to_utf8(charset, &bytes)
        }
        "base64" => match decode_base64_forgiving(body) {
            Some(bytes) => charset_to_utf8(charset, &bytes),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

/// Quoted-printable decode: strip soft breaks (`=\n` after newline
/// normalization), substitute `=XX` digraphs.
fn decode_quoted_printable(body: &str) -> Vec<u8> {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                i += 2; // soft line break
                continue;
            }
            if i + 2 < bytes.len() {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""),
                    16,
                ) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Salvage visible content from a body whose MIME structure did not decode.
///
/// Strips scaffold lines (boundaries, part headers) and keeps the rest only
/// when at least [`FALLBACK_MIN_PRINTABLE`] printable characters remain.
fn raw_body_fallback(body: &str) -> Option<String> {
    let mut kept = String::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        if is_scaffold_header(trimmed) {
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }

    let printable = kept.chars().filter(|c| c.is_ascii_graphic() || (!c.is_ascii() && !c.is_control())).count();
    if printable >= FALLBACK_MIN_PRINTABLE {
        Some(kept.trim().to_string())
    } else {
        None
    }
}

/// MIME scaffold lines that leak into undecodable bodies.
fn is_scaffold_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("content-type:")
        || lower.starts_with("content-transfer-encoding:")
        || lower.starts_with("content-disposition:")
        || lower.starts_with("content-id:")
        || lower.starts_with("mime-version:")
}

/// Binary-content guard: detect attachment bytes that leaked into the text
/// stream of a malformed multipart.
///
/// Signals: JFIF/Exif tokens in the first 100 chars, base64 image prefixes
/// (`/9j/` JPEG, `iVBOR` PNG), `GIF8` magic, or more than
/// `threshold` non-printable characters (excluding CR/LF/TAB) in the first
/// 200 chars. Lossy decoding maps raw binary to U+FFFD, which counts as
/// non-printable here.
pub fn looks_binary(body: &str, threshold: f64) -> bool {
    if body.is_empty() {
        return false;
    }

    let head: String = body.chars().take(100).collect();
    if head.contains("JFIF") || head.contains("Exif") {
        return true;
    }

    let trimmed = body.trim_start();
    if trimmed.starts_with("/9j/") || trimmed.starts_with("iVBOR") || trimmed.starts_with("GIF8") {
        return true;
    }

    let sample: Vec<char> = body.chars().take(200).collect();
    if sample.is_empty() {
        return false;
    }
    let non_printable = sample
        .iter()
        .filter(|&&c| {
            (c.is_control() && c != '\n' && c != '\r' && c != '\t') || c == '\u{FFFD}'
        })
        .count();

    non_printable as f64 / sample.len() as f64 > threshold
}

/// Convert HTML to plain text.
///
/// - Block elements (`<br>`, `<p>`, `<div>`, `<li>`, headings) become newlines
/// - Scripts and styles are removed
/// - Common entities are decoded
/// - Blank runs collapse to a single empty line
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    let mut result = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) => {
                let tag = after[..close].trim().to_lowercase();
                let name = tag
                    .trim_start_matches('/')
                    .split([' ', '/'])
                    .next()
                    .unwrap_or("");
                if matches!(
                    name,
                    "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
                ) {
                    result.push('\n');
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unclosed tag: drop the rest
                rest = "";
            }
        }
    }
    result.push_str(rest);

    // Decode HTML entities
    let mut decoded = result;
    for (entity, replacement) in [
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&#160;", " "),
    ] {
        decoded = decoded.replace(entity, replacement);
    }

    // Collapse blank runs
    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(decoded.len());
    for line in decoded.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    while let Some(start) = remaining.to_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        if let Some(end) = after.to_lowercase().find(&close) {
            remaining = &after[end + close.len()..];
        } else {
            remaining = "";
            break;
        }
    }
    result.push_str(remaining);
    result
}
