//! Chunked byte sources.
//!
//! Both archive parsers consume their input through [`ChunkedReader`]: a
//! sequential iterator over owned, UTF-8-decoded chunks. The whole source is
//! never memory-resident at once. Path mode streams a file in 100 MiB
//! slices; buffer mode slices an in-memory buffer at 5 MiB (falling back to
//! the file granularity for very large buffers).
//!
//! Line endings are normalized to `\n` and invalid UTF-8 sequences are
//! replaced; the parsers never abort on encoding errors.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::ParserConfig;
use crate::error::{ArchiveError, Result};

/// Where the archive bytes come from.
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    /// A file on disk, streamed at file granularity.
    Path(PathBuf),
    /// An in-memory buffer (e.g. a host-provided blob slice).
    Buffer(Vec<u8>),
}

impl ArchiveSource {
    /// Human-readable label for error messages and logs.
    pub fn label(&self) -> PathBuf {
        match self {
            Self::Path(p) => p.clone(),
            Self::Buffer(_) => PathBuf::from("<buffer>"),
        }
    }

    /// Total source length in bytes, when knowable without reading.
    pub fn len(&self) -> Result<u64> {
        match self {
            Self::Path(p) => std::fs::metadata(p)
                .map(|m| m.len())
                .map_err(|e| ArchiveError::source_unavailable(p, e)),
            Self::Buffer(b) => Ok(b.len() as u64),
        }
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read the first `n` bytes (fewer if the source is shorter), for format
    /// sniffing.
    pub fn head(&self, n: usize) -> Result<Vec<u8>> {
        match self {
            Self::Path(p) => {
                let file = File::open(p).map_err(|e| ArchiveError::source_unavailable(p, e))?;
                let mut buf = Vec::with_capacity(n);
                file.take(n as u64)
                    .read_to_end(&mut buf)
                    .map_err(|e| ArchiveError::source_unavailable(p, e))?;
                Ok(buf)
            }
            Self::Buffer(b) => Ok(b[..b.len().min(n)].to_vec()),
        }
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&Path> for ArchiveSource {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(b: Vec<u8>) -> Self {
        Self::Buffer(b)
    }
}

#[derive(Debug)]
enum Inner {
    File { file: File, path: PathBuf },
    Buffer { data: Vec<u8>, pos: usize },
}

/// Sequential reader yielding normalized text chunks.
#[derive(Debug)]
pub struct ChunkedReader {
    inner: Inner,
    chunk_size: usize,
    /// Bytes held back across chunk boundaries: an incomplete trailing UTF-8
    /// sequence and/or a trailing `\r` that may pair with a `\n` in the next
    /// chunk.
    carry: Vec<u8>,
    bytes_read: u64,
    total_size: u64,
    done: bool,
}

impl ChunkedReader {
    /// Open a source with the configured chunk granularity.
    pub fn open(source: ArchiveSource, config: &ParserConfig) -> Result<Self> {
        let total_size = source.len()?;
        match source {
            ArchiveSource::Path(path) => {
                let file =
                    File::open(&path).map_err(|e| ArchiveError::source_unavailable(&path, e))?;
                Ok(Self {
                    inner: Inner::File { file, path },
                    chunk_size: config.file_chunk_size.max(1),
                    carry: Vec::new(),
                    bytes_read: 0,
                    total_size,
                    done: false,
                })
            }
            ArchiveSource::Buffer(data) => {
                // Very large buffers are re-chunked at file granularity so a
                // single chunk never approaches platform string-size caps.
                let chunk_size = if data.len() > config.large_buffer_threshold {
                    config.file_chunk_size
                } else {
                    config.buffer_chunk_size
                };
                Ok(Self {
                    inner: Inner::Buffer { data, pos: 0 },
                    chunk_size: chunk_size.max(1),
                    carry: Vec::new(),
                    bytes_read: 0,
                    total_size,
                    done: false,
                })
            }
        }
    }

    /// Total source length in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Raw bytes consumed so far (for progress reporting).
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Yield the next chunk, or `None` at end of source.
    ///
    /// Chunks are owned strings with `\n` line endings and lossy UTF-8
    /// decoding applied.
    pub fn next_chunk(&mut self) -> Result<Option<String>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let raw = self.read_raw()?;
            let at_eof = raw.len() < self.chunk_size;
            self.bytes_read += raw.len() as u64;

            let mut buf = std::mem::take(&mut self.carry);
            buf.extend_from_slice(&raw);

            if buf.is_empty() {
                self.done = true;
                return Ok(None);
            }

            if at_eof {
                self.done = true;
            } else {
                let hold = holdback_len(&buf);
                if hold >= buf.len() {
                    // Nothing emittable yet (tiny chunk entirely held back);
                    // read more.
                    self.carry = buf;
                    continue;
                }
                if hold > 0 {
                    self.carry = buf.split_off(buf.len() - hold);
                }
            }

            return Ok(Some(normalize_chunk(&buf)));
        }
    }

    fn read_raw(&mut self) -> Result<Vec<u8>> {
        match &mut self.inner {
            Inner::File { file, path } => {
                let mut buf = vec![0u8; self.chunk_size];
                let mut filled = 0;
                while filled < buf.len() {
                    match file.read(&mut buf[filled..]) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(ArchiveError::source_unavailable(&*path, e)),
                    }
                }
                buf.truncate(filled);
                Ok(buf)
            }
            Inner::Buffer { data, pos } => {
                let end = (*pos + self.chunk_size).min(data.len());
                let slice = data[*pos..end].to_vec();
                *pos = end;
                Ok(slice)
            }
        }
    }
}

/// How many trailing bytes must wait for the next chunk: an incomplete UTF-8
/// sequence, plus a `\r` that may be the first half of a `\r\n` pair.
fn holdback_len(buf: &[u8]) -> usize {
    let mut hold = incomplete_utf8_suffix(buf);
    if buf.len() > hold && buf[buf.len() - hold - 1] == b'\r' {
        hold += 1;
    }
    hold
}

/// Length of an incomplete multi-byte UTF-8 sequence at the end of `buf`
/// (0 when the buffer ends on a complete character).
fn incomplete_utf8_suffix(buf: &[u8]) -> usize {
    // A sequence is at most 4 bytes; scan back at most 3.
    let start = buf.len().saturating_sub(3);
    for i in (start..buf.len()).rev() {
        let b = buf[i];
        if b < 0x80 {
            return 0; // ASCII tail, complete
        }
        if b >= 0xC0 {
            // Leading byte: is the full sequence present?
            let needed = if b >= 0xF0 {
                4
            } else if b >= 0xE0 {
                3
            } else {
                2
            };
            let have = buf.len() - i;
            return if have < needed { have } else { 0 };
        }
        // Continuation byte, keep scanning back
    }
    0
}

/// Normalize `\r\n` and bare `\r` to `\n`, then decode lossily.
fn normalize_chunk(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\r' {
            out.push(b'\n');
            if i + 1 < raw.len() && raw[i + 1] == b'\n' {
                i += 2;
            } else {
                i += 1;
            }
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config(chunk: usize) -> ParserConfig {
        ParserConfig {
            file_chunk_size: chunk,
            buffer_chunk_size: chunk,
            ..ParserConfig::default()
        }
    }

    fn read_all(source: ArchiveSource, chunk: usize) -> String {
        let mut reader = ChunkedReader::open(source, &tiny_config(chunk)).unwrap();
        let mut out = String::new();
        while let Some(c) = reader.next_chunk().unwrap() {
            out.push_str(&c);
        }
        out
    }

    #[test]
    fn test_buffer_roundtrip() {
        let text = read_all(ArchiveSource::Buffer(b"hello\nworld\n".to_vec()), 4);
        assert_eq!(text, "hello\nworld\n");
    }

    #[test]
    fn test_crlf_normalized() {
        let text = read_all(ArchiveSource::Buffer(b"a\r\nb\rc\n".to_vec()), 1024);
        assert_eq!(text, "a\nb\nc\n");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        // With chunk size 2, the \r lands at a chunk end and must not become
        // a double newline when the \n follows in the next chunk.
        let text = read_all(ArchiveSource::Buffer(b"a\r\nb\r\nc".to_vec()), 2);
        assert_eq!(text, "a\nb\nc");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        // 'é' is two bytes; every odd chunk size splits it at some boundary.
        let text = read_all(ArchiveSource::Buffer("café con leña".as_bytes().to_vec()), 3);
        assert_eq!(text, "café con leña");
    }

    #[test]
    fn test_trailing_cr_at_eof() {
        let text = read_all(ArchiveSource::Buffer(b"line\r".to_vec()), 1024);
        assert_eq!(text, "line\n");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let text = read_all(ArchiveSource::Buffer(vec![b'a', 0xFF, b'b']), 1024);
        assert!(text.starts_with('a') && text.ends_with('b'));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let err = ChunkedReader::open(
            ArchiveSource::Path(PathBuf::from("/no/such/file.mbox")),
            &ParserConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_chunking_invariance() {
        let data = b"From a@b.c Mon Jan 01 00:00:00 2024\r\nSubject: x\r\n\r\nbody \xC3\xA9\r\n";
        let reference = read_all(ArchiveSource::Buffer(data.to_vec()), 1024 * 1024);
        for chunk in 1..=16 {
            assert_eq!(
                read_all(ArchiveSource::Buffer(data.to_vec()), chunk),
                reference,
                "chunk size {chunk} changed the decoded stream"
            );
        }
    }
}
