//! Request frames sent from client to server.

use bytes::{Bytes, BytesMut};

use super::{read_line, read_payload, ParseError, CRLF};
use crate::cache::MAX_KEY_LENGTH;
use crate::error::CacheError;

/// A single cache command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Store a value; a TTL of zero never expires
    Set { key: String, value: Bytes, ttl: u32 },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

impl Request {
    /// Command word as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Set { .. } => "SET",
            Request::Get { .. } => "GET",
            Request::Has { .. } => "HAS",
            Request::Delete { .. } => "DELETE",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Request::Set { key, .. }
            | Request::Get { key }
            | Request::Has { key }
            | Request::Delete { key } => key,
        }
    }

    /// Checks that `key` can travel as a single space-delimited token.
    pub fn validate_key(key: &str) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::MalformedRequest(
                "key cannot be empty".to_string(),
            ));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::MalformedRequest(format!(
                "key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if key.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(CacheError::MalformedRequest(
                "key cannot contain whitespace".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses one request from the front of `buf`.
    ///
    /// Returns the request and the number of bytes it occupied. SET payloads
    /// longer than `max_value_length` are rejected without being buffered.
    pub fn parse(buf: &[u8], max_value_length: usize) -> Result<(Self, usize), ParseError> {
        let (line, header_len) = read_line(buf)?;

        let line = std::str::from_utf8(line)
            .map_err(|_| ParseError::malformed("request is not valid UTF-8", header_len, 0))?;
        let parts: Vec<&str> = line.split_ascii_whitespace().collect();

        let Some(word) = parts.first() else {
            return Err(ParseError::malformed("empty command", header_len, 0));
        };
        let command = word.to_ascii_uppercase();

        match command.as_str() {
            "SET" => Self::parse_set(buf, &parts, header_len, max_value_length),
            "GET" | "HAS" | "DELETE" => {
                if parts.len() != 2 {
                    return Err(ParseError::malformed(
                        format!("wrong number of arguments for {}", command),
                        header_len,
                        0,
                    ));
                }

                let key = parts[1];
                Self::validate_key(key).map_err(|error| ParseError::Rejected {
                    error,
                    consumed: header_len,
                    discard: 0,
                })?;

                let key = key.to_string();
                let request = match command.as_str() {
                    "GET" => Request::Get { key },
                    "HAS" => Request::Has { key },
                    _ => Request::Delete { key },
                };
                Ok((request, header_len))
            }
            _ => Err(ParseError::malformed(
                format!("unknown command '{}'", word),
                header_len,
                0,
            )),
        }
    }

    fn parse_set(
        buf: &[u8],
        parts: &[&str],
        header_len: usize,
        max_value_length: usize,
    ) -> Result<(Self, usize), ParseError> {
        if parts.len() != 4 {
            return Err(ParseError::malformed(
                "wrong number of arguments for SET",
                header_len,
                0,
            ));
        }

        let len: usize = parts[3]
            .parse()
            .map_err(|_| ParseError::malformed("invalid value length", header_len, 0))?;

        // from here on the payload length is known, so a rejected SET can
        // still be skipped without losing framing
        let reject = move |error: CacheError| ParseError::Rejected {
            error,
            consumed: header_len,
            discard: len.saturating_add(CRLF.len()),
        };

        let ttl: u32 = parts[2]
            .parse()
            .map_err(|_| reject(CacheError::MalformedRequest("invalid ttl".to_string())))?;

        Self::validate_key(parts[1]).map_err(reject)?;

        if len > max_value_length {
            return Err(reject(CacheError::ValueTooLarge {
                len,
                max: max_value_length,
            }));
        }

        let value = read_payload(buf, header_len, len)?;

        Ok((
            Request::Set {
                key: parts[1].to_string(),
                value: Bytes::copy_from_slice(value),
                ttl,
            },
            header_len + len + CRLF.len(),
        ))
    }

    /// Appends the wire form of this request to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Request::Set { key, value, ttl } => {
                buf.extend_from_slice(format!("SET {} {} {}\r\n", key, ttl, value.len()).as_bytes());
                buf.extend_from_slice(value);
                buf.extend_from_slice(CRLF);
            }
            Request::Get { key } | Request::Has { key } | Request::Delete { key } => {
                buf.extend_from_slice(format!("{} {}\r\n", self.name(), key).as_bytes());
            }
        }
    }
}
