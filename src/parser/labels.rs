//! Gmail label interpretation (`X-Gmail-Labels`).
//!
//! Gmail Takeout spools carry folder membership, read state and stars as a
//! single comma-separated header. This module parses it and maps labels to
//! the canonical folder set.

/// Labels Gmail manages itself; never eligible as custom folders.
const SYSTEM_LABELS: &[&str] = &["opened", "unread", "starred", "important", "all mail"];

/// Folder ids every archive maps into (custom labels aside).
const FOLDER_PRIORITY: &[(&str, &str)] = &[
    ("inbox", "inbox"),
    ("sent", "sent"),
    ("sent mail", "sent"),
    ("draft", "drafts"),
    ("drafts", "drafts"),
    ("spam", "spam"),
    ("trash", "trash"),
];

/// Parse an `X-Gmail-Labels` value into normalized (lowercased) labels.
///
/// Labels are comma-separated; a label containing commas is double-quoted.
pub fn parse_gmail_labels(header_value: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in header_value.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let label = current.trim().to_lowercase();
                if !label.is_empty() {
                    labels.push(label);
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let label = current.trim().to_lowercase();
    if !label.is_empty() {
        labels.push(label);
    }

    labels
}

/// Map a set of labels to the single canonical folder for a record.
///
/// Priority: `inbox` > `sent` > `drafts` > `spam` > `trash` > first custom
/// label (kebab-cased) > `archive`.
pub fn folder_id_from_labels(labels: &[String]) -> String {
    for (label, folder) in FOLDER_PRIORITY {
        if labels.iter().any(|l| l == label) {
            return (*folder).to_string();
        }
    }
    if let Some(custom) = labels.iter().find(|l| is_custom_label(l)) {
        return kebab_case(custom);
    }
    "archive".to_string()
}

/// Map every label in a header to its folder id, deduplicated in order.
///
/// The result is a subset of the predefined folder set plus kebab-cased
/// customs, and the mapping is idempotent: feeding the output back through
/// produces the same ids.
pub fn folder_ids_from_labels(header_value: &str) -> Vec<String> {
    let labels = parse_gmail_labels(header_value);
    let mut ids: Vec<String> = Vec::new();
    for label in &labels {
        let id = match FOLDER_PRIORITY.iter().find(|(l, _)| l == label) {
            Some((_, folder)) => (*folder).to_string(),
            None if is_custom_label(label) => kebab_case(label),
            None => continue,
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Read state per Gmail semantics: unread until the `unread` label is absent.
pub fn is_read(labels: &[String]) -> bool {
    !labels.iter().any(|l| l == "unread")
}

/// Starred state.
pub fn is_starred(labels: &[String]) -> bool {
    labels.iter().any(|l| l == "starred")
}

/// Whether a label may act as a custom folder.
fn is_custom_label(label: &str) -> bool {
    !SYSTEM_LABELS.contains(&label)
        && !label.starts_with("category ")
        && FOLDER_PRIORITY.iter().all(|(l, _)| *l != label)
}

/// Kebab-case a custom label: lowercase, strip `[^a-z0-9 -]`, spaces to
/// hyphens, truncated to 50 chars.
pub fn kebab_case(label: &str) -> String {
    let cleaned: String = label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ' || *c == '-')
        .collect();
    let kebab: String = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    kebab.chars().take(50).collect()
}
