//! Connection Handler
//!
//! Drives one client connection: read a request, dispatch it to the engine,
//! write the response, repeat.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::cache::CacheEngine;
use crate::error::Result;
use crate::protocol::{ParseError, Request, Response};

const READ_BUFFER_CAPACITY: usize = 4 * 1024;

/// Per-connection request loop.
///
/// Generic over the transport so tests can drive it with an in-memory stream.
pub struct Connection<S> {
    stream: S,
    engine: Arc<CacheEngine>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// Payload bytes of a rejected SET still to be skipped
    discard: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, engine: Arc<CacheEngine>) -> Self {
        Self {
            stream,
            engine,
            read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            write_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            discard: 0,
        }
    }

    /// Serves requests until the peer disconnects.
    ///
    /// Malformed requests get an `ERR` response and the loop continues. An
    /// I/O failure ends the connection with an error; unframeable input ends
    /// it after reporting the problem to the peer.
    pub async fn run(&mut self) -> Result<()> {
        let max_value_length = self.engine.max_value_length();

        loop {
            if self.discard > 0 {
                let skip = self.discard.min(self.read_buf.len());
                self.read_buf.advance(skip);
                self.discard -= skip;
            }

            if self.discard == 0 && !self.read_buf.is_empty() {
                match Request::parse(&self.read_buf, max_value_length) {
                    Ok((request, consumed)) => {
                        self.read_buf.advance(consumed);
                        let response = self.dispatch(request).await;
                        self.write_response(&response).await?;
                        continue;
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(ParseError::Rejected {
                        error,
                        consumed,
                        discard,
                    }) => {
                        debug!(%error, "rejected request");
                        self.read_buf.advance(consumed);
                        self.discard = discard;
                        self.write_response(&Response::Error(error.to_string()))
                            .await?;
                        continue;
                    }
                    Err(ParseError::Fatal(message)) => {
                        warn!(%message, "closing connection on unframeable input");
                        self.write_response(&Response::Error(message)).await?;
                        return Ok(());
                    }
                }
            }

            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                if !self.read_buf.is_empty() || self.discard > 0 {
                    debug!("peer closed connection mid-request");
                }
                return Ok(());
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::Set { key, value, ttl } => match self.engine.set(key, value, ttl).await {
                Ok(()) => Response::Ok,
                Err(error) => Response::Error(error.to_string()),
            },
            Request::Get { key } => match self.engine.get(&key).await {
                Some(value) => Response::Value(value),
                None => Response::NotFound,
            },
            Request::Has { key } => {
                if self.engine.has(&key).await {
                    Response::Exists
                } else {
                    Response::NotFound
                }
            }
            Request::Delete { key } => {
                self.engine.delete(&key).await;
                Response::Ok
            }
        }
    }

    async fn write_response(&mut self, response: &Response) -> Result<()> {
        self.write_buf.clear();
        response.encode(&mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
