// src/core/protocol/codec.rs

//! Implements the text framing used on a session's connection: a `Decoder`
//! that cuts `;`-terminated statements out of the byte stream and an
//! `Encoder` that writes rendered results back, each followed by a blank
//! line.

use super::result::QueryResult;
use crate::core::SigmaError;
use crate::core::format;
use crate::core::query::{Statement, parse_statement};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Default cap on text buffered without a complete statement (1 MiB).
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 1024 * 1024;

/// Statement decoder and result encoder for one connection.
///
/// A decoded item is itself a `Result`: text that fails to parse yields
/// `Some(Err(..))` so the session can answer with an error and carry on,
/// while the decoder's own error type is reserved for conditions that end
/// the session (I/O failures and the buffer cap).
#[derive(Debug)]
pub struct QueryCodec {
    max_buffered: usize,
    /// Bytes of the buffer already scanned for a terminator.
    scanned: usize,
    /// Whether the scan stopped inside a string literal.
    in_string: bool,
}

impl Default for QueryCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED_BYTES)
    }
}

impl QueryCodec {
    pub fn new(max_buffered: usize) -> Self {
        Self {
            max_buffered,
            scanned: 0,
            in_string: false,
        }
    }

    /// Finds the next `;` that is not inside a single-quoted literal,
    /// resuming where the previous call stopped.
    fn find_terminator(&mut self, src: &BytesMut) -> Option<usize> {
        for (offset, byte) in src[self.scanned..].iter().enumerate() {
            match byte {
                b'\'' => self.in_string = !self.in_string,
                b';' if !self.in_string => {
                    let end = self.scanned + offset;
                    self.scanned = 0;
                    return Some(end);
                }
                _ => {}
            }
        }
        self.scanned = src.len();
        None
    }

    fn reset(&mut self) {
        self.scanned = 0;
        self.in_string = false;
    }
}

fn decode_statement(text: &[u8]) -> Result<Statement, SigmaError> {
    let text = std::str::from_utf8(text)?;
    parse_statement(text)
}

impl Decoder for QueryCodec {
    type Item = Result<Statement, SigmaError>;
    type Error = SigmaError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.find_terminator(src) {
                Some(end) => {
                    let chunk = src.split_to(end + 1);
                    self.reset();
                    let text = &chunk[..end];
                    if text.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(decode_statement(text)));
                }
                None => {
                    if !self.in_string && src.iter().all(u8::is_ascii_whitespace) {
                        src.clear();
                        self.reset();
                    } else if src.len() > self.max_buffered {
                        return Err(SigmaError::BufferLimitExceeded(self.max_buffered));
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        self.reset();
        Ok(Some(Err(SigmaError::Parse(format!(
            "incomplete statement at end of input ({} bytes without a terminating ';')",
            rest.len()
        )))))
    }
}

impl Encoder<QueryResult> for QueryCodec {
    type Error = SigmaError;

    fn encode(&mut self, item: QueryResult, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // A blank line ends every result.
        dst.extend_from_slice(format::render(&item).as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
