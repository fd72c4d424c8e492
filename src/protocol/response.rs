//! Response frames sent from server to client.

use bytes::{Bytes, BytesMut};

use super::{read_line, read_payload, ParseError, CRLF};

/// Server reply to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// SET or DELETE succeeded
    Ok,
    /// GET found a live value
    Value(Bytes),
    /// HAS found a live value
    Exists,
    /// GET or HAS found nothing
    NotFound,
    /// The request failed; the connection stays usable
    Error(String),
}

impl Response {
    /// Parses one response from the front of `buf`.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        let (line, header_len) = read_line(buf)?;

        match line {
            b"OK" => Ok((Response::Ok, header_len)),
            b"EXISTS" => Ok((Response::Exists, header_len)),
            b"NOT_FOUND" => Ok((Response::NotFound, header_len)),
            _ if line.starts_with(b"ERR") => {
                let message = String::from_utf8_lossy(&line[3..]).trim().to_string();
                Ok((Response::Error(message), header_len))
            }
            _ if line.starts_with(b"VALUE ") => {
                let len: usize = std::str::from_utf8(&line[6..])
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .ok_or_else(|| ParseError::Fatal("invalid VALUE length".to_string()))?;

                let value = read_payload(buf, header_len, len)?;
                Ok((
                    Response::Value(Bytes::copy_from_slice(value)),
                    header_len + len + CRLF.len(),
                ))
            }
            _ => Err(ParseError::Fatal(format!(
                "unrecognized response '{}'",
                String::from_utf8_lossy(line)
            ))),
        }
    }

    /// Appends the wire form of this response to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Response::Ok => buf.extend_from_slice(b"OK\r\n"),
            Response::Exists => buf.extend_from_slice(b"EXISTS\r\n"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Value(value) => {
                buf.extend_from_slice(format!("VALUE {}\r\n", value.len()).as_bytes());
                buf.extend_from_slice(value);
                buf.extend_from_slice(CRLF);
            }
            Response::Error(message) => {
                // error text must stay on one line
                let message = message.replace(['\r', '\n'], " ");
                buf.extend_from_slice(format!("ERR {}\r\n", message).as_bytes());
            }
        }
    }
}
