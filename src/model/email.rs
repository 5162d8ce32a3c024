//! The normalized email record emitted by every archive format.

use chrono::{DateTime, Utc};

/// Placeholder subject for messages without a `Subject:` header.
pub const NO_SUBJECT: &str = "(No Subject)";

/// Observability cap applied to [`EmailRecord::size`]. The content itself is
/// never truncated.
pub const SIZE_CAP: usize = 100_000;

/// A single normalized email, produced by the MBOX and OLM parsers alike.
///
/// Invariants after normalization:
/// - `sender` contains exactly one `@` (records failing this are never emitted)
/// - `date` is always a valid instant (malformed headers fall back to "now")
/// - `body` or `html_body` is non-empty unless the subject is non-empty
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmailRecord {
    /// Decoded subject line; [`NO_SUBJECT`] when the header is missing.
    pub subject: String,

    /// Sender address, lowercased, angle brackets stripped.
    pub sender: String,

    /// Sender display name, RFC 2047 decoded.
    pub sender_name: Option<String>,

    /// Recipient addresses in header order; duplicates allowed.
    pub recipients: Vec<String>,

    /// Parsed date; `Utc::now()` when the header is malformed or missing.
    pub date: DateTime<Utc>,

    /// Decoded plain-text body (possibly derived from stripped HTML).
    pub body: String,

    /// Decoded HTML body, when a `text/html` part exists.
    pub html_body: Option<String>,

    /// Raw message length in bytes, capped at [`SIZE_CAP`].
    pub size: usize,

    /// Read state, from Gmail labels or OLM flags.
    pub is_read: bool,

    /// Starred/flagged state, from Gmail labels or OLM flags.
    pub is_starred: bool,

    /// Canonical folder name (`inbox`, `sent`, `drafts`, `spam`, `trash`,
    /// a kebab-cased custom label, or `archive`).
    pub folder_id: String,

    /// Normalized Gmail labels, when `X-Gmail-Labels` was present.
    pub labels: Option<Vec<String>>,

    /// Thread identifier; see [`crate::parser::thread::derive_thread_id`].
    pub thread_id: Option<String>,

    /// RFC 822 `Message-ID`, angle brackets included.
    pub message_id: Option<String>,

    /// Whether any MIME part carries `Content-Disposition: attachment`.
    pub has_attachments: bool,

    /// Attachment metadata. Payloads are never decoded.
    pub attachments: Vec<AttachmentMeta>,
}

/// Attachment metadata collected while walking MIME parts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AttachmentMeta {
    /// Filename from `Content-Disposition` or `Content-Type` `name=`.
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Encoded-size estimate in bytes.
    pub size: usize,
}

impl EmailRecord {
    /// The domain part of the sender address, or `""`.
    pub fn sender_domain(&self) -> &str {
        self.sender.rsplit_once('@').map(|(_, d)| d).unwrap_or("")
    }

    /// Subject and body concatenated, lowercased: the haystack every
    /// detector scans.
    pub fn classification_text(&self) -> String {
        let mut text = String::with_capacity(self.subject.len() + self.body.len() + 1);
        text.push_str(&self.subject.to_lowercase());
        text.push('\n');
        text.push_str(&self.body.to_lowercase());
        text
    }

    /// Whether a subject was actually present in the source.
    pub fn has_real_subject(&self) -> bool {
        !self.subject.is_empty() && self.subject != NO_SUBJECT
    }
}
