//! Subject normalization and thread-identifier derivation.

use super::header::{angle_tokens, first_angle_token, get_header};
use super::labels::kebab_case;

/// Reply/forward prefixes stripped during subject normalization, across the
/// languages Gmail and Outlook emit (`AW:` German, `SV:` Swedish/Norwegian,
/// `VS:` Finnish, `Antw:` Dutch, `R:` Italian).
const REPLY_PREFIXES: &[&str] = &["re", "fwd", "fw", "aw", "sv", "vs", "antw", "r"];

/// Strip reply/forward prefixes, repeatedly, until the subject is stable.
///
/// The operation is idempotent: `normalize_subject(normalize_subject(s)) ==
/// normalize_subject(s)`.
pub fn normalize_subject(subject: &str) -> String {
    let mut current = subject.trim();

    loop {
        let mut stripped = None;
        if let Some(colon) = current.find(':') {
            let prefix = current[..colon].trim().to_lowercase();
            if REPLY_PREFIXES.contains(&prefix.as_str()) {
                stripped = Some(current[colon + 1..].trim_start());
            }
        }
        match stripped {
            Some(rest) => current = rest,
            None => break,
        }
    }

    current.trim().to_string()
}

/// Derive a stable thread identifier for a message.
///
/// Derivation order: `X-Gm-Thrid` → `Thread-Topic` → first `References`
/// token → `In-Reply-To` → synthetic `subject:<kebab-cased normalized
/// subject>`. Returns `None` only when every source is empty.
pub fn derive_thread_id(headers: &[(String, String)], subject: &str) -> Option<String> {
    if let Some(thrid) = get_header(headers, "x-gm-thrid") {
        let trimmed = thrid.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(topic) = get_header(headers, "thread-topic") {
        let trimmed = topic.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(references) = get_header(headers, "references") {
        if let Some(first) = angle_tokens(references).into_iter().next() {
            return Some(first);
        }
    }

    if let Some(reply_to) = get_header(headers, "in-reply-to") {
        let token = first_angle_token(reply_to)
            .or_else(|| {
                let bare = reply_to.trim();
                (!bare.is_empty()).then(|| bare.to_string())
            });
        if let Some(token) = token {
            return Some(token);
        }
    }

    let normalized = normalize_subject(subject);
    if normalized.is_empty() {
        return None;
    }
    Some(format!("subject:{}", kebab_case(&normalized)))
}
