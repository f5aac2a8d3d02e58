//! Incremental decoder for the journal export format served by
//! `systemd-journal-gatewayd`.
//!
//! The response starts with HTTP headers terminated by a blank line. Each
//! entry then follows as one field per line and ends with an empty line.
//! Text fields are `NAME=value\n`. Binary-safe fields are `NAME\n`, a
//! little-endian `u64` length, the raw bytes and a trailing `\n`; their
//! values are skipped without being buffered.

use std::io;
use std::mem;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::entry::JournalEntry;

/// Longest header or field line accepted before the stream is considered
/// out of sync.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Headers,
    FieldLine,
    BinaryLength,
    BinaryValue { remaining: u64 },
    BinaryTerminator,
}

#[derive(Debug)]
pub struct ExportDecoder {
    phase: Phase,
    entry: JournalEntry,
    // Set once any field line of the current entry was read, binary ones
    // included, so an entry made only of binary fields is still emitted.
    started: bool,
    binary_field: String,
    scanned: usize,
}

impl ExportDecoder {
    /// Decoder for a full response, headers included.
    pub fn new() -> Self {
        Self::with_phase(Phase::Headers)
    }

    /// Decoder for a bare entry stream with no header block.
    pub fn entries_only() -> Self {
        Self::with_phase(Phase::FieldLine)
    }

    fn with_phase(phase: Phase) -> Self {
        Self {
            phase,
            entry: JournalEntry::new(),
            started: false,
            binary_field: String::new(),
            scanned: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fields accumulated for the entry currently being read.
    pub fn pending_fields(&self) -> usize {
        self.entry.len()
    }

    /// Splits the next `\n`-terminated line off `buf`, without the
    /// terminator.
    fn take_line(&mut self, buf: &mut BytesMut) -> io::Result<Option<BytesMut>> {
        let start = self.scanned.min(buf.len());
        match buf[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = start + offset;
                self.scanned = 0;
                let mut line = buf.split_to(end + 1);
                line.truncate(end);
                Ok(Some(line))
            }
            None if buf.len() > MAX_LINE_LEN => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {MAX_LINE_LEN} bytes"),
            )),
            None => {
                self.scanned = buf.len();
                Ok(None)
            }
        }
    }
}

impl Default for ExportDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ExportDecoder {
    type Item = JournalEntry;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<JournalEntry>> {
        loop {
            match self.phase {
                Phase::Headers => {
                    let Some(line) = self.take_line(buf)? else {
                        return Ok(None);
                    };
                    if line.as_ref() == b"\r" || line.is_empty() {
                        self.phase = Phase::FieldLine;
                    }
                }
                Phase::FieldLine => {
                    let Some(line) = self.take_line(buf)? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        if !mem::take(&mut self.started) {
                            continue;
                        }
                        return Ok(Some(mem::take(&mut self.entry)));
                    }
                    self.started = true;
                    match line.iter().position(|b| *b == b'=') {
                        Some(eq) => {
                            let name = String::from_utf8_lossy(&line[..eq]);
                            let value = String::from_utf8_lossy(&line[eq + 1..]);
                            self.entry.insert(name, value);
                        }
                        None => {
                            self.binary_field = String::from_utf8_lossy(&line).into_owned();
                            self.phase = Phase::BinaryLength;
                        }
                    }
                }
                Phase::BinaryLength => {
                    if buf.len() < 8 {
                        buf.reserve(8 - buf.len());
                        return Ok(None);
                    }
                    let remaining = buf.get_u64_le();
                    self.phase = Phase::BinaryValue { remaining };
                }
                Phase::BinaryValue { remaining: 0 } => {
                    self.phase = Phase::BinaryTerminator;
                }
                Phase::BinaryValue { remaining } => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let skip = remaining.min(buf.len() as u64);
                    buf.advance(skip as usize);
                    self.phase = Phase::BinaryValue {
                        remaining: remaining - skip,
                    };
                }
                Phase::BinaryTerminator => {
                    let Some(&next) = buf.first() else {
                        return Ok(None);
                    };
                    if next == b'\n' {
                        buf.advance(1);
                    } else {
                        tracing::debug!(
                            field = %self.binary_field,
                            "binary field not followed by newline"
                        );
                    }
                    self.binary_field.clear();
                    self.phase = Phase::FieldLine;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::entry::{CURSOR, MESSAGE};

    fn decode_all(decoder: &mut ExportDecoder, bytes: &[u8]) -> Vec<JournalEntry> {
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(entry) = decoder.decode(&mut buf).unwrap() {
            out.push(entry);
        }
        out
    }

    fn binary_field(name: &str, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(name.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&(value.len() as u64).to_le_bytes());
        out.extend_from_slice(value);
        out.push(b'\n');
        out
    }

    #[test]
    fn single_text_entry() {
        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, b"MESSAGE=hello\n\n");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get(MESSAGE), Some("hello"));
        assert_eq!(entries[0].len(), 1);
        assert_eq!(entries[0].cursor(), None);
    }

    #[test]
    fn skips_headers() {
        let mut decoder = ExportDecoder::new();
        let response = b"HTTP/1.0 200 OK\r\nContent-Type: application/vnd.fdo.journal\r\n\r\n\
                         __CURSOR=s=1\nMESSAGE=up\n\n";
        let entries = decode_all(&mut decoder, response);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get(CURSOR), Some("s=1"));
        assert_eq!(entries[0].get(MESSAGE), Some("up"));
        assert_eq!(decoder.phase(), Phase::FieldLine);
    }

    #[test]
    fn binary_field_is_dropped_and_stream_stays_in_sync() {
        let mut stream = binary_field("FIELD", b"abc");
        stream.extend_from_slice(b"MESSAGE=next\n\n");

        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, &stream);

        assert_eq!(entries.len(), 1);
        assert!(!entries[0].contains("FIELD"));
        assert_eq!(entries[0].get(MESSAGE), Some("next"));
    }

    #[test]
    fn record_of_only_a_binary_field_yields_one_empty_entry() {
        let mut stream = binary_field("FIELD", b"abc");
        stream.push(b'\n');

        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, &stream);

        assert_eq!(entries.len(), 1);
        assert!(!entries[0].contains("FIELD"));
        assert!(entries[0].is_empty());
        assert_eq!(decoder.phase(), Phase::FieldLine);
    }

    #[test]
    fn binary_value_with_newlines_and_equals() {
        let mut stream = b"MESSAGE=before\n".to_vec();
        stream.extend(binary_field("COREDUMP", b"a=b\n\n\nc"));
        stream.extend_from_slice(b"_COMM=sh\n\n");

        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, &stream);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get(MESSAGE), Some("before"));
        assert_eq!(entries[0].get("_COMM"), Some("sh"));
        assert!(!entries[0].contains("COREDUMP"));
        assert!(!entries[0].contains("a"));
    }

    #[test]
    fn byte_at_a_time_matches_whole_buffer() {
        let mut stream = b"HTTP/1.0 200 OK\r\n\r\n__CURSOR=s=1\nMESSAGE=one\n".to_vec();
        stream.extend(binary_field("BLOB", &[0, 1, 2, 255, b'\n']));
        stream.extend_from_slice(b"\n__CURSOR=s=2\nMESSAGE=two\n\n");

        let mut whole = ExportDecoder::new();
        let expected = decode_all(&mut whole, &stream);
        assert_eq!(expected.len(), 2);

        let mut decoder = ExportDecoder::new();
        let mut buf = BytesMut::new();
        let mut got = Vec::new();
        for byte in &stream {
            buf.extend_from_slice(&[*byte]);
            while let Some(entry) = decoder.decode(&mut buf).unwrap() {
                got.push(entry);
            }
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn truncated_binary_value_yields_nothing() {
        let mut stream = b"MESSAGE=partial\nBLOB\n".to_vec();
        stream.extend_from_slice(&10u64.to_le_bytes());
        stream.extend_from_slice(b"abc");

        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, &stream);

        assert!(entries.is_empty());
        assert_eq!(decoder.phase(), Phase::BinaryValue { remaining: 7 });
        assert_eq!(decoder.pending_fields(), 1);
    }

    #[test]
    fn incomplete_entry_at_eof_is_an_error() {
        let mut decoder = ExportDecoder::entries_only();
        let mut buf = BytesMut::from(&b"MESSAGE=half"[..]);
        assert!(decoder.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn value_keeps_everything_after_first_equals() {
        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, b"MESSAGE=a=b=c\nEMPTY=\n\n");

        assert_eq!(entries[0].get(MESSAGE), Some("a=b=c"));
        assert_eq!(entries[0].get("EMPTY"), Some(""));
    }

    #[test]
    fn blank_lines_between_entries_are_ignored() {
        let mut decoder = ExportDecoder::entries_only();
        let entries = decode_all(&mut decoder, b"\n\nMESSAGE=x\n\n\n");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut decoder = ExportDecoder::entries_only();
        let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_LEN + 1].as_slice());
        assert!(decoder.decode(&mut buf).is_err());
    }
}
