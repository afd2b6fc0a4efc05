//!
//! Scanner Module - Byte-Accurate Line Reading
//!
//! Turns the raw bytes of a test script into logical lines. Decoding is done
//! by hand so that an invalid byte is reported with its value and offset
//! instead of being replaced.
//!
//! Rules:
//! - A line ends at LF; CR bytes are dropped wherever they appear
//! - UTF-8 sequences are 1-4 bytes, length taken from the lead byte
//! - Blank lines come back as empty strings
//! - With `skip_blank_lines`, whitespace before a line is skipped
//!
//! Cursor operations:
//! - peek_line / consume_peeked: look ahead one line, then commit it
//! - putback: return to where the previous consuming read started
//!

use std::fmt;

use memchr::{memchr, memchr_iter};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid UTF-8 byte (#{byte}) at offset {offset}")]
pub struct ScanError {
    pub byte: u8,
    pub offset: usize,
}

/// Byte range of one line, excluding its terminator.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    pos: usize,
    line_no: usize,
}

pub struct Scanner {
    src: Vec<u8>,
    cur: Cursor,
    putback: Cursor,
    peeked: Cursor,
    skip_blank_lines: bool,
}

impl Scanner {
    pub fn new(src: impl Into<Vec<u8>>) -> Self {
        Self {
            src: src.into(),
            cur: Cursor::default(),
            putback: Cursor::default(),
            peeked: Cursor::default(),
            skip_blank_lines: false,
        }
    }

    pub fn with_skip_blank_lines(mut self, skip: bool) -> Self {
        self.skip_blank_lines = skip;
        self
    }

    pub fn source(&self) -> &[u8] {
        &self.src
    }

    /// 1-based number of the most recently consumed line; 0 before any read.
    pub fn line_no(&self) -> usize {
        self.cur.line_no
    }

    pub fn rewind(&mut self) {
        self.cur = Cursor::default();
        self.putback = Cursor::default();
        self.peeked = Cursor::default();
    }

    pub fn next_line(&mut self) -> Result<Option<String>, ScanError> {
        self.putback = self.cur;
        match self.scan_from(self.cur)? {
            Some((line, end)) => {
                self.cur = end;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    pub fn peek_line(&mut self) -> Result<Option<String>, ScanError> {
        match self.scan_from(self.cur)? {
            Some((line, end)) => {
                self.peeked = end;
                Ok(Some(line))
            }
            None => {
                self.peeked = self.cur;
                Ok(None)
            }
        }
    }

    /// Commits the state recorded by the last `peek_line`.
    pub fn consume_peeked(&mut self) {
        self.putback = self.cur;
        self.cur = self.peeked;
    }

    pub fn putback(&mut self) {
        self.cur = self.putback;
    }

    /// Byte span of line `line_no` (1-based) in the raw source.
    pub fn line_span(&self, line_no: usize) -> Option<Span> {
        if line_no == 0 {
            return None;
        }
        let mut start = 0;
        let mut newlines = memchr_iter(b'\n', &self.src);
        for _ in 1..line_no {
            start = newlines.next()? + 1;
        }
        if start > self.src.len() {
            return None;
        }
        let end = memchr(b'\n', &self.src[start..]).map_or(self.src.len(), |i| start + i);
        let end = if end > start && self.src[end - 1] == b'\r' {
            end - 1
        } else {
            end
        };
        Some(Span::new(start, end))
    }

    fn scan_from(&self, from: Cursor) -> Result<Option<(String, Cursor)>, ScanError> {
        let mut pos = from.pos;
        let mut line_no = from.line_no;

        if self.skip_blank_lines {
            while let Some(&b) = self.src.get(pos) {
                match b {
                    b' ' | b'\t' | b'\r' => pos += 1,
                    b'\n' => {
                        pos += 1;
                        line_no += 1;
                    }
                    _ => break,
                }
            }
        }

        if pos >= self.src.len() {
            return Ok(None);
        }

        let rest = &self.src[pos..];
        let (raw, next) = match memchr(b'\n', rest) {
            Some(i) => (&rest[..i], pos + i + 1),
            None => (rest, self.src.len()),
        };
        let line = decode_line(raw, pos)?;
        Ok(Some((
            line,
            Cursor {
                pos: next,
                line_no: line_no + 1,
            },
        )))
    }
}

fn decode_line(raw: &[u8], base: usize) -> Result<String, ScanError> {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        let width = match b {
            b'\r' => {
                i += 1;
                continue;
            }
            0x00..=0x7f => 1,
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Err(ScanError { byte: b, offset: base + i }),
        };
        let invalid = ScanError { byte: b, offset: base + i };
        let seq = raw.get(i..i + width).ok_or(invalid.clone())?;
        let decoded = std::str::from_utf8(seq).map_err(|_| invalid)?;
        out.push_str(decoded);
        i += width;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        let mut scanner = Scanner::new(src);
        let mut out = Vec::new();
        while let Some(line) = scanner.next_line().expect("valid input") {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_basic_lines() {
        assert_eq!(lines("a\nb\nc"), vec!["a", "b", "c"]);
        assert_eq!(lines("a\nb\n"), vec!["a", "b"]);
        assert!(lines("").is_empty());
    }

    #[test]
    fn test_blank_lines_are_kept() {
        assert_eq!(lines("a\n\n\nb\n"), vec!["a", "", "", "b"]);
    }

    #[test]
    fn test_carriage_returns_dropped() {
        assert_eq!(lines("a\r\nb\rc\r\n"), vec!["a", "bc"]);
    }

    #[test]
    fn test_multibyte_sequences() {
        assert_eq!(lines("h\u{e9}llo\n\u{20ac}\n\u{1f600}"), vec!["h\u{e9}llo", "\u{20ac}", "\u{1f600}"]);
    }

    #[test]
    fn test_invalid_lead_byte() {
        let mut scanner = Scanner::new(b"ok\nab\xffc\n".to_vec());
        assert_eq!(scanner.next_line().unwrap(), Some("ok".to_string()));
        let err = scanner.next_line().unwrap_err();
        assert_eq!(err, ScanError { byte: 0xff, offset: 5 });
        assert!(err.to_string().contains("#255"));
    }

    #[test]
    fn test_truncated_sequence() {
        let mut scanner = Scanner::new(b"x\xe2\x82".to_vec());
        let err = scanner.next_line().unwrap_err();
        assert_eq!(err.byte, 0xe2);
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn test_bad_continuation_byte() {
        let mut scanner = Scanner::new(b"\xc3(".to_vec());
        assert!(scanner.next_line().is_err());
    }

    #[test]
    fn test_line_numbers() {
        let mut scanner = Scanner::new("one\n\nthree\n");
        assert_eq!(scanner.line_no(), 0);
        scanner.next_line().unwrap();
        assert_eq!(scanner.line_no(), 1);
        scanner.next_line().unwrap();
        scanner.next_line().unwrap();
        assert_eq!(scanner.line_no(), 3);
        assert_eq!(scanner.next_line().unwrap(), None);
    }

    #[test]
    fn test_peek_and_consume() {
        let mut scanner = Scanner::new("first\nsecond\n");
        assert_eq!(scanner.peek_line().unwrap().as_deref(), Some("first"));
        assert_eq!(scanner.peek_line().unwrap().as_deref(), Some("first"));
        assert_eq!(scanner.line_no(), 0);
        scanner.consume_peeked();
        assert_eq!(scanner.line_no(), 1);
        assert_eq!(scanner.next_line().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_putback() {
        let mut scanner = Scanner::new("a\nb\n");
        scanner.next_line().unwrap();
        assert_eq!(scanner.next_line().unwrap().as_deref(), Some("b"));
        scanner.putback();
        assert_eq!(scanner.line_no(), 1);
        assert_eq!(scanner.next_line().unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_skip_blank_lines() {
        let mut scanner = Scanner::new("\n  \n\tx\n\n  ").with_skip_blank_lines(true);
        assert_eq!(scanner.next_line().unwrap().as_deref(), Some("x"));
        assert_eq!(scanner.line_no(), 3);
        assert_eq!(scanner.next_line().unwrap(), None);
    }

    #[test]
    fn test_line_span() {
        let scanner = Scanner::new("ab\r\ncde\n\nf");
        assert_eq!(scanner.line_span(1), Some(Span::new(0, 2)));
        assert_eq!(scanner.line_span(2), Some(Span::new(4, 7)));
        assert_eq!(scanner.line_span(3), Some(Span::new(8, 8)));
        assert_eq!(scanner.line_span(4), Some(Span::new(9, 10)));
        assert_eq!(scanner.line_span(5), None);
        assert_eq!(scanner.line_span(0), None);
    }
}
