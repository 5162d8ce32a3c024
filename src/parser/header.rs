//! RFC 5322 header handling: folding, encoded-words (RFC 2047), and date parsing.

use std::sync::OnceLock;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::warn;

/// Unfold headers into `(lowercase_name, value)` pairs in source order.
///
/// A line starting with whitespace continues the previous header; its
/// content is appended after a single space. Lines without a colon that are
/// not continuations are ignored.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        match line.chars().next() {
            Some(' ') | Some('\t') => {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            }
            _ => {
                let Some((name, value)) = line.split_once(':') else {
                    continue;
                };
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
    }

    headers
}

/// Get the value for a header name. Last value wins on duplicates.
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// `=?charset?B|Q?payload?=` tokens. Payloads never contain `?` or
/// whitespace, so a single alternation-free pattern finds every well-formed
/// word.
fn encoded_word_pattern() -> &'static Regex {
    static ENCODED_WORD: OnceLock<Regex> = OnceLock::new();
    ENCODED_WORD.get_or_init(|| {
        Regex::new(r"=\?([^?\s]+)\?([A-Za-z])\?([^?\s]*)\?=").expect("valid encoded-word pattern")
    })
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Whitespace between two decodable words is transparent (RFC 2047 §6.2),
/// so `"=?UTF-8?B?QnVlbm9z?= =?UTF-8?B?IGTDrWFz?="` becomes `"Buenos días"`.
/// A word that fails to decode is kept verbatim, as is any text the pattern
/// does not match.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    let mut decoded_up_to: Option<usize> = None;

    for caps in encoded_word_pattern().captures_iter(input) {
        let whole = caps.get(0).expect("group 0 always present");
        let gap = &input[cursor..whole.start()];
        // Keep the gap unless it is pure whitespace between two decoded words
        if decoded_up_to != Some(cursor) || !gap.trim().is_empty() {
            out.push_str(gap);
        }

        match decode_single_word(&caps[1], &caps[2], &caps[3]) {
            Some(text) => {
                out.push_str(&text);
                decoded_up_to = Some(whole.end());
            }
            None => {
                out.push_str(whole.as_str());
                decoded_up_to = None;
            }
        }
        cursor = whole.end();
    }

    out.push_str(&input[cursor..]);
    out
}

/// One word: payload bytes per the encoding letter, then charset conversion.
fn decode_single_word(charset: &str, encoding: &str, payload: &str) -> Option<String> {
    let raw = match encoding {
        "B" | "b" => decode_base64_forgiving(payload)?,
        "Q" | "q" => decode_q_text(payload),
        _ => return None,
    };
    Some(charset_to_utf8(charset, &raw))
}

/// Base64 decode tolerating embedded whitespace and missing padding.
pub fn decode_base64_forgiving(input: &str) -> Option<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let engine = base64::engine::general_purpose::STANDARD;
    engine.decode(&compact).ok().or_else(|| {
        // Retry with padding stripped (some producers omit or overpad)
        let trimmed = compact.trim_end_matches('=');
        base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(trimmed)
            .ok()
    })
}

/// Q-encoding (RFC 2047 §4.2): `_` means space, `=XX` is a hex-escaped byte,
/// everything else is literal. A dangling or malformed escape stays a
/// literal `=`.
fn decode_q_text(payload: &str) -> Vec<u8> {
    let raw = payload.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut idx = 0;

    while idx < raw.len() {
        match raw[idx] {
            b'_' => {
                out.push(b' ');
                idx += 1;
            }
            b'=' => match raw.get(idx + 1..idx + 3).and_then(hex_pair) {
                Some(byte) => {
                    out.push(byte);
                    idx += 3;
                }
                None => {
                    out.push(b'=');
                    idx += 1;
                }
            },
            literal => {
                out.push(literal);
                idx += 1;
            }
        }
    }

    out
}

/// Two ASCII hex digits to a byte.
fn hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Convert raw bytes to UTF-8 using a MIME charset label.
///
/// `encoding_rs` resolves every label the email corpus produces in practice
/// (including aliases like `latin1`); anything it does not know decays to
/// lossy UTF-8.
pub fn charset_to_utf8(label: &str, raw: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => {
            let (text, _, _) = encoding.decode(raw);
            text.into_owned()
        }
        None => {
            warn!(charset = label, "Unknown charset label, decoding as UTF-8");
            String::from_utf8_lossy(raw).into_owned()
        }
    }
}

/// All `<…>` tokens in a header value, brackets included (References).
pub fn angle_tokens(value: &str) -> Vec<String> {
    value
        .split('<')
        .skip(1)
        .filter_map(|segment| {
            segment
                .split_once('>')
                .map(|(id, _)| format!("<{id}>"))
        })
        .collect()
}

/// The first `<…>` token in a header value (Message-ID, In-Reply-To).
pub fn first_angle_token(value: &str) -> Option<String> {
    angle_tokens(value).into_iter().next()
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and several broken real-world variants.
/// Returns `None` when nothing matches; callers fall back to `Utc::now()`
/// so a record's date is never null.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let bare = without_weekday(trimmed);
    if let Some(dt) = try_known_formats(bare) {
        return Some(dt);
    }

    // Last resort: rewrite a trailing timezone abbreviation to its offset
    if let Some(rewritten) = with_numeric_offset(bare) {
        if let Some(dt) = try_known_formats(&rewritten) {
            return Some(dt);
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Try the format table, zoned first, then naive (assumed UTC).
fn try_known_formats(candidate: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 10] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
        if let Ok(day) = NaiveDate::parse_from_str(candidate, fmt) {
            if let Some(start) = day.and_hms_opt(0, 0, 0) {
                return Some(Utc.from_utc_datetime(&start));
            }
        }
    }

    None
}

/// Drop a leading weekday token (`Thu, 04 Jan` → `04 Jan`).
fn without_weekday(s: &str) -> &str {
    const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
    let first = s.split([',', ' ']).next().unwrap_or("");
    if DAY_NAMES.iter().any(|d| first.eq_ignore_ascii_case(d)) {
        s[first.len()..].trim_start_matches([',', ' '])
    } else {
        s
    }
}

/// Rewrite a trailing timezone abbreviation (`… EST`) to a numeric offset.
fn with_numeric_offset(s: &str) -> Option<String> {
    const OFFSETS: [(&str, &str); 13] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("CEST", "+0200"),
        ("JST", "+0900"),
    ];

    let (rest, zone) = s.rsplit_once(' ')?;
    let mapped = OFFSETS
        .iter()
        .find(|(name, _)| zone.eq_ignore_ascii_case(name))?
        .1;
    Some(format!("{rest} {mapped}"))
}
