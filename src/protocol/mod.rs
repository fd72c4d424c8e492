//! Wire Protocol Module
//!
//! Line-oriented request/response codec shared by the server and the client.
//!
//! Requests:
//! - `SET <key> <ttl> <len>\r\n<len bytes>\r\n`
//! - `GET <key>\r\n`, `HAS <key>\r\n`, `DELETE <key>\r\n`
//!
//! Responses:
//! - `OK\r\n`
//! - `VALUE <len>\r\n<len bytes>\r\n`
//! - `EXISTS\r\n`
//! - `NOT_FOUND\r\n`
//! - `ERR <message>\r\n`
//!
//! Values are length-prefixed so they may contain any bytes, the terminator
//! included. Command words are case-insensitive; a bare `\n` is accepted as a
//! line terminator on input.

mod request;
mod response;

pub use request::Request;
pub use response::Response;

use crate::error::CacheError;

/// Longest header line accepted before the input is considered unframeable
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Line and payload terminator
pub const CRLF: &[u8] = b"\r\n";

// == Parse Error ==
/// Outcome of a parse attempt that did not yield a complete frame.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Need more data to complete parsing.
    #[error("incomplete")]
    Incomplete,

    /// The frame is invalid but framing is intact.
    ///
    /// `consumed` bytes are already buffered and belong to the rejected frame;
    /// `discard` more bytes follow on the wire and must be skipped as well.
    #[error("{error}")]
    Rejected {
        error: CacheError,
        consumed: usize,
        discard: usize,
    },

    /// The input cannot be framed; the connection must be closed.
    #[error("{0}")]
    Fatal(String),
}

impl ParseError {
    fn malformed(message: impl Into<String>, consumed: usize, discard: usize) -> Self {
        ParseError::Rejected {
            error: CacheError::MalformedRequest(message.into()),
            consumed,
            discard,
        }
    }
}

/// Finds the next header line.
///
/// Returns the line without its terminator and the number of bytes it spans
/// including the terminator.
fn read_line(buf: &[u8]) -> Result<(&[u8], usize), ParseError> {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) if pos > MAX_LINE_LENGTH => {
            Err(ParseError::Fatal("header line too long".to_string()))
        }
        Some(pos) => {
            let line = &buf[..pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            Ok((line, pos + 1))
        }
        None if buf.len() > MAX_LINE_LENGTH => {
            Err(ParseError::Fatal("header line too long".to_string()))
        }
        None => Err(ParseError::Incomplete),
    }
}

/// Reads a `len`-byte payload plus its `\r\n` terminator starting at `start`.
fn read_payload(buf: &[u8], start: usize, len: usize) -> Result<&[u8], ParseError> {
    let end = start.saturating_add(len);
    if buf.len() < end.saturating_add(CRLF.len()) {
        return Err(ParseError::Incomplete);
    }

    if &buf[end..end + CRLF.len()] != CRLF {
        return Err(ParseError::Fatal(
            "payload not terminated by CRLF".to_string(),
        ));
    }

    Ok(&buf[start..end])
}
