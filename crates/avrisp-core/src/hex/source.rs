//! Line sources for firmware images
//!
//! The session reads the image one line per step. A [`LineSource`] hands
//! out those lines and knows how many there are in total, which drives
//! progress reporting.

use crate::error::{Error, Result};
use heapless::Vec;

/// Longest line kept from an image
///
/// A full 255-byte data record takes 521 characters; the slack covers a
/// carriage return and stray whitespace. Longer lines are truncated, which
/// the record parser then rejects.
pub const MAX_LINE_LEN: usize = 528;

/// Buffer holding one line without its newline
pub type LineBuffer = Vec<u8, MAX_LINE_LEN>;

/// On-disk width of a 16-byte data record including CR/LF
pub const RECORD_LINE_WIDTH: u64 = 44;

/// A sequential reader of image lines
pub trait LineSource {
    /// Number of lines the source will yield, for progress reporting
    fn total_lines(&self) -> u32;

    /// Read the next line into `line`, without its terminating newline
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    fn next_line(&mut self, line: &mut LineBuffer) -> Result<bool>;
}

/// Estimate the line count of an image from its size in bytes
///
/// Assumes the common dialect of 16 data bytes per record. Use this only
/// when the image cannot be scanned up front.
pub fn estimate_lines_from_size(size: u64) -> u32 {
    (size / RECORD_LINE_WIDTH).min(u32::MAX as u64) as u32
}

/// Count the lines [`SliceSource`] yields for `data`
///
/// Blank lines count; a final newline does not start another line.
pub fn count_lines(data: &[u8]) -> u32 {
    let newlines = data.iter().filter(|&&b| b == b'\n').count() as u32;
    match data.last() {
        None => 0,
        Some(b'\n') => newlines,
        Some(_) => newlines + 1,
    }
}

fn fill(line: &mut LineBuffer, bytes: &[u8]) {
    let room = MAX_LINE_LEN - line.len();
    if bytes.len() > room {
        log::debug!("Truncating line longer than {} bytes", MAX_LINE_LEN);
    }
    let take = bytes.len().min(room);
    // Cannot fail, `take` fits in the remaining capacity
    let _ = line.extend_from_slice(&bytes[..take]);
}

/// An image held in memory
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    remaining: &'a [u8],
    total_lines: u32,
}

impl<'a> SliceSource<'a> {
    /// Create a source over `data`, counting its lines
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            remaining: data,
            total_lines: count_lines(data),
        }
    }

    /// Create a source over `data` reporting `total_lines` for progress
    pub fn with_total_lines(data: &'a [u8], total_lines: u32) -> Self {
        Self {
            remaining: data,
            total_lines,
        }
    }
}

impl LineSource for SliceSource<'_> {
    fn total_lines(&self) -> u32 {
        self.total_lines
    }

    fn next_line(&mut self, line: &mut LineBuffer) -> Result<bool> {
        line.clear();
        if self.remaining.is_empty() {
            return Ok(false);
        }

        let (current, rest) = match self.remaining.iter().position(|&b| b == b'\n') {
            Some(end) => (&self.remaining[..end], &self.remaining[end + 1..]),
            None => (self.remaining, &[][..]),
        };
        fill(line, current);
        self.remaining = rest;
        Ok(true)
    }
}

/// An image streamed from an [`embedded_io::BufRead`] reader
///
/// The line total cannot be known without reading the image twice, so it
/// is supplied by the caller, for instance via [`estimate_lines_from_size`].
pub struct ReaderSource<R> {
    reader: R,
    total_lines: u32,
}

impl<R: embedded_io::BufRead> ReaderSource<R> {
    /// Wrap `reader`, reporting `total_lines` for progress
    pub fn new(reader: R, total_lines: u32) -> Self {
        Self {
            reader,
            total_lines,
        }
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: embedded_io::BufRead> LineSource for ReaderSource<R> {
    fn total_lines(&self) -> u32 {
        self.total_lines
    }

    fn next_line(&mut self, line: &mut LineBuffer) -> Result<bool> {
        line.clear();
        let mut read_any = false;
        loop {
            let (done, used) = {
                let available = self.reader.fill_buf().map_err(|_| Error::ReadError)?;
                if available.is_empty() {
                    return Ok(read_any);
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        fill(line, &available[..end]);
                        (true, end + 1)
                    }
                    None => {
                        fill(line, available);
                        (false, available.len())
                    }
                }
            };
            self.reader.consume(used);
            read_any = true;
            if done {
                return Ok(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec as StdVec;

    fn collect<S: LineSource>(mut source: S) -> StdVec<StdVec<u8>> {
        let mut lines = StdVec::new();
        let mut buf = LineBuffer::new();
        while source.next_line(&mut buf).unwrap() {
            lines.push(buf.to_vec());
        }
        lines
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(b""), 0);
        assert_eq!(count_lines(b"a"), 1);
        assert_eq!(count_lines(b"a\n"), 1);
        assert_eq!(count_lines(b"a\n\nb"), 3);
        assert_eq!(count_lines(b"a\r\nb\r\n"), 2);
    }

    #[test]
    fn test_slice_source_yields_counted_lines() {
        let data = b":00000001FF\r\n\n:00000001FF";
        let source = SliceSource::new(data);
        assert_eq!(source.total_lines(), 3);
        let lines = collect(source);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], b":00000001FF\r");
        assert!(lines[1].is_empty());
        assert_eq!(lines[2], b":00000001FF");
    }

    #[test]
    fn test_total_override() {
        let source = SliceSource::with_total_lines(b"x\ny\n", 10);
        assert_eq!(source.total_lines(), 10);
        assert_eq!(collect(source).len(), 2);
    }

    #[test]
    fn test_long_line_truncated() {
        let mut data = std::vec![b'A'; MAX_LINE_LEN + 10];
        data.extend_from_slice(b"\nB");
        let lines = collect(SliceSource::new(&data));
        assert_eq!(lines[0].len(), MAX_LINE_LEN);
        assert_eq!(lines[1], b"B");
    }

    #[test]
    fn test_reader_source_matches_slice_source() {
        let data: &[u8] = b":0100000011EE\n:00000001FF\n";
        let reader = ReaderSource::new(data, estimate_lines_from_size(data.len() as u64));
        assert_eq!(reader.total_lines(), 0);
        assert_eq!(collect(reader), collect(SliceSource::new(data)));
    }

    #[test]
    fn test_reader_source_without_final_newline() {
        let data: &[u8] = b"abc\ndef";
        let lines = collect(ReaderSource::new(data, 2));
        assert_eq!(lines, [b"abc".to_vec(), b"def".to_vec()]);
    }

    #[test]
    fn test_estimate_lines() {
        assert_eq!(estimate_lines_from_size(44 * 16 + 13), 16);
    }
}
