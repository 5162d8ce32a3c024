//! Centralized error types for mailsift.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailsift library.
///
/// Only three variants are fatal for an archive: [`SourceUnavailable`],
/// [`MalformedArchive`] and [`Cancelled`]. Everything else is recovered
/// locally: the offending record is dropped and the stream continues.
///
/// [`SourceUnavailable`]: ArchiveError::SourceUnavailable
/// [`MalformedArchive`]: ArchiveError::MalformedArchive
/// [`Cancelled`]: ArchiveError::Cancelled
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The byte source cannot be opened or read.
    #[error("source unavailable '{path}': {source}")]
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The OLM container is not a readable ZIP archive.
    #[error("malformed archive '{path}': {reason}")]
    MalformedArchive { path: PathBuf, reason: String },

    /// A single message failed to parse (bad MIME boundary, invalid header).
    ///
    /// Never surfaces from a full-archive parse; the record is dropped and
    /// counted in `ParseStats::dropped_records`.
    #[error("malformed record at message {index}: {reason}")]
    MalformedRecord { index: u64, reason: String },

    /// A body looked like misplaced binary/attachment data.
    ///
    /// Recovered the same way as [`ArchiveError::MalformedRecord`].
    #[error("binary content guard triggered at message {index}")]
    BinaryGuard { index: u64 },

    /// The host cancelled the parse between two chunks or message emits.
    #[error("operation cancelled by host")]
    Cancelled,
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create a `SourceUnavailable` from a path and an `io::Error`.
    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create a `MalformedArchive` from a path and a reason.
    pub fn malformed_archive(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole archive.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::MalformedArchive { .. } | Self::Cancelled
        )
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ArchiveError`
/// when no path context is available (rare; prefer `source_unavailable`).
impl From<std::io::Error> for ArchiveError {
    fn from(source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: PathBuf::from("<buffer>"),
            source,
        }
    }
}
