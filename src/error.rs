//! Error types for the cache server and client
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine, wire protocol and client.
///
/// A missing key is not an error: GET and HAS report it as a normal outcome.
#[derive(Error, Debug)]
pub enum CacheError {
    /// SET value is longer than the largest configured size class
    #[error("value too large: {len} bytes exceeds maximum of {max}")]
    ValueTooLarge { len: usize, max: usize },

    /// No size class accepts a value of this length
    #[error("no size class for value of {0} bytes")]
    NoSizeClass(usize),

    /// Request had the wrong shape at the protocol layer
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Client gave up after exhausting its connection attempts
    #[error("connection to {addr} failed after {attempts} attempts")]
    ConnectionFailed { addr: String, attempts: u32 },

    /// Client operation issued before `connect` or after `end`
    #[error("client is not connected")]
    NotConnected,

    /// Server sent something the client could not interpret
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Error status reported by the server for a single request
    #[error("server error: {0}")]
    Server(String),

    /// Configuration rejected at startup
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network failure mid-operation
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
