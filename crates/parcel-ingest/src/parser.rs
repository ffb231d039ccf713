//! Record parser
//!
//! Extract files are pipe-delimited, one record per line, latin-1 encoded.
//! Parsing is deliberately shallow:
//!
//! 1. strip the line terminator and surrounding whitespace
//! 2. delete every single quote (`'`)
//! 3. split on `|`
//!
//! Step 2 is lossy: an apostrophe inside a legitimate value (`O'NEIL`) is
//! dropped and cannot be recovered. Rows already loaded were stored that
//! way, so the behaviour is kept for consistency with them.
//!
//! No column count is checked here. A short or long line yields a short or
//! long token list, and the store decides what to do with it.

use parcel_common::text::{decode_latin1, strip_line_terminator};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Field delimiter
pub const DELIMITER: char = '|';

/// One line of an input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based position within the file
    pub line_number: u64,
    /// Decoded line without its terminator
    pub raw: String,
}

impl Record {
    pub fn tokens(&self) -> Vec<String> {
        parse_line(&self.raw)
    }
}

/// Split one raw line into column tokens
pub fn parse_line(raw: &str) -> Vec<String> {
    let line = raw.trim_end_matches('\n').trim().replace('\'', "");
    line.split(DELIMITER).map(str::to_string).collect()
}

/// Streams [`Record`]s from a buffered byte reader
pub struct RecordReader<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: u64,
}

impl<R: AsyncBufRead + Unpin> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(1024),
            line_number: 0,
        }
    }

    /// Next line, or `None` at end of input
    pub async fn next_record(&mut self) -> std::io::Result<Option<Record>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }

        self.line_number += 1;
        Ok(Some(Record {
            line_number: self.line_number,
            raw: decode_latin1(strip_line_terminator(&self.buf)),
        }))
    }

    /// Lines read so far
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }
}
