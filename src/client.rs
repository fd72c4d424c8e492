//! Protocol Client
//!
//! Typed async client for the cache server. One client owns one connection;
//! concurrent callers are serialized so a single request is in flight at a
//! time.

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::protocol::{ParseError, Request, Response};

/// Pause between failed connection attempts
const RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct ClientConnection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl ClientConnection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(4 * 1024),
            write_buf: BytesMut::with_capacity(4 * 1024),
        }
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response> {
        self.write_buf.clear();
        request.encode(&mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        loop {
            match Response::parse(&self.read_buf) {
                Ok((response, consumed)) => {
                    self.read_buf.advance(consumed);
                    return Ok(response);
                }
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(CacheError::UnexpectedResponse(e.to_string())),
            }

            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(CacheError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }
        }
    }
}

/// Async client for one cache server node.
///
/// # Example
/// ```ignore
/// let client = CacheClient::new("127.0.0.1:3000");
/// client.connect(5, Duration::from_secs(5)).await?;
/// client.set("greeting", "hello", 60).await?;
/// assert_eq!(client.get("greeting").await?, Some(Bytes::from("hello")));
/// client.end().await;
/// ```
#[derive(Debug)]
pub struct CacheClient {
    addr: String,
    request_timeout: Option<Duration>,
    conn: Mutex<Option<ClientConnection>>,
}

impl CacheClient {
    /// Creates an unconnected client for `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            request_timeout: None,
            conn: Mutex::new(None),
        }
    }

    /// Bounds every round trip. A timed-out request drops the connection,
    /// since its late response would otherwise be read as the next reply.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    // == Connect ==
    /// Establishes the connection, trying up to `max_retries` times.
    ///
    /// Each attempt is bounded by `per_attempt_timeout`. Fails with
    /// [`CacheError::ConnectionFailed`] once every attempt has failed.
    pub async fn connect(&self, max_retries: u32, per_attempt_timeout: Duration) -> Result<()> {
        let mut conn = self.conn.lock().await;

        for attempt in 1..=max_retries {
            match tokio::time::timeout(per_attempt_timeout, TcpStream::connect(&self.addr)).await
            {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY: {}", e);
                    }
                    *conn = Some(ClientConnection::new(stream));
                    info!(addr = %self.addr, attempt, "Connected to cache server");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(addr = %self.addr, attempt, max_retries, "Connection attempt failed: {}", e);
                }
                Err(_) => {
                    warn!(addr = %self.addr, attempt, max_retries, "Connection attempt timed out");
                }
            }

            if attempt < max_retries {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Err(CacheError::ConnectionFailed {
            addr: self.addr.clone(),
            attempts: max_retries,
        })
    }

    // == Round Trip ==
    /// Sends one request and waits for its response.
    ///
    /// Any transport failure drops the connection; later calls fail with
    /// [`CacheError::NotConnected`] until `connect` succeeds again.
    async fn round_trip(&self, request: Request) -> Result<Response> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(CacheError::NotConnected)?;

        let result = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.exchange(&request)).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{} request timed out", request.name()),
                ))),
            },
            None => conn.exchange(&request).await,
        };

        if let Err(e) = &result {
            warn!(addr = %self.addr, "Dropping connection after failed {}: {}", request.name(), e);
            *guard = None;
        }

        result
    }

    // == Set ==
    /// Stores `value` under `key`; a `ttl_seconds` of zero never expires.
    pub async fn set(&self, key: &str, value: impl Into<Bytes>, ttl_seconds: u32) -> Result<()> {
        Request::validate_key(key)?;
        let request = Request::Set {
            key: key.to_string(),
            value: value.into(),
            ttl: ttl_seconds,
        };

        match self.round_trip(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected("SET", other)),
        }
    }

    // == Get ==
    /// Fetches the value under `key`, or `None` when absent or expired.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Request::validate_key(key)?;

        match self.round_trip(Request::Get { key: key.to_string() }).await? {
            Response::Value(value) => Ok(Some(value)),
            Response::NotFound => Ok(None),
            other => Err(unexpected("GET", other)),
        }
    }

    // == Has ==
    /// Checks whether `key` holds a live value.
    pub async fn has(&self, key: &str) -> Result<bool> {
        Request::validate_key(key)?;

        match self.round_trip(Request::Has { key: key.to_string() }).await? {
            Response::Exists => Ok(true),
            Response::NotFound => Ok(false),
            other => Err(unexpected("HAS", other)),
        }
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        Request::validate_key(key)?;

        match self.round_trip(Request::Delete { key: key.to_string() }).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected("DELETE", other)),
        }
    }

    // == End ==
    /// Closes the connection. Calling it again is a no-op.
    pub async fn end(&self) {
        if let Some(mut conn) = self.conn.lock().await.take() {
            if let Err(e) = conn.stream.shutdown().await {
                debug!("Error while closing connection: {}", e);
            }
            info!(addr = %self.addr, "Connection closed");
        }
    }
}

fn unexpected(command: &str, response: Response) -> CacheError {
    match response {
        Response::Error(message) => CacheError::Server(message),
        other => CacheError::UnexpectedResponse(format!("{:?} in reply to {}", other, command)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_operations_require_connection() {
        let client = CacheClient::new("127.0.0.1:1");

        assert!(!client.is_connected().await);
        assert!(matches!(client.get("k").await, Err(CacheError::NotConnected)));
        assert!(matches!(
            client.set("k", "v", 0).await,
            Err(CacheError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_locally() {
        let client = CacheClient::new("127.0.0.1:1");

        assert!(matches!(
            client.get("two words").await,
            Err(CacheError::MalformedRequest(_))
        ));
        assert!(matches!(
            client.has("").await,
            Err(CacheError::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_retries() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CacheClient::new(addr.to_string());
        let result = client.connect(3, Duration::from_millis(200)).await;

        match result {
            Err(CacheError::ConnectionFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately() {
        let client = CacheClient::new("127.0.0.1:1");
        let result = client.connect(0, Duration::from_millis(10)).await;
        assert!(matches!(
            result,
            Err(CacheError::ConnectionFailed { attempts: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_server_variant() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = tokio::io::BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader
                .get_mut()
                .write_all(b"ERR value too large: 9 bytes exceeds maximum of 4\r\n")
                .await
                .unwrap();
        });

        let client = CacheClient::new(addr.to_string());
        client.connect(1, Duration::from_secs(1)).await.unwrap();

        let result = client.delete("k").await;
        assert!(matches!(result, Err(CacheError::Server(msg)) if msg.contains("too large")));
        // per-request errors keep the connection
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_request_timeout_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            // never answer
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = CacheClient::new(addr.to_string())
            .with_request_timeout(Duration::from_millis(100));
        client.connect(1, Duration::from_secs(1)).await.unwrap();

        let result = client.get("k").await;
        assert!(matches!(result, Err(CacheError::Io(_))));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let client = CacheClient::new(addr.to_string());
        client.connect(1, Duration::from_secs(1)).await.unwrap();
        assert!(client.is_connected().await);

        client.end().await;
        client.end().await;
        assert!(!client.is_connected().await);
    }
}
