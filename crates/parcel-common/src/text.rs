//! Single-byte text handling
//!
//! County extracts are delivered in ISO-8859-1. Every byte maps to the
//! Unicode code point with the same value, so decoding is total: no input
//! byte sequence can make a line undecodable.

/// Decode a latin-1 byte slice into an owned `String`.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Strip one trailing `\n` (and a `\r` before it) from a raw line.
pub fn strip_line_terminator(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}
