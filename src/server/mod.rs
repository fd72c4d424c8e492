//! Protocol Server
//!
//! Accepts TCP connections and serves each one on its own task. The cache
//! engine is the only state shared between connections.

mod connection;

pub use connection::Connection;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, Instrument};

use crate::cache::CacheEngine;
use crate::error::Result;

/// Pause after a failed `accept` before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP front end for a [`CacheEngine`].
pub struct Server {
    listener: TcpListener,
    engine: Arc<CacheEngine>,
}

impl Server {
    /// Binds the listening socket.
    pub async fn bind(addr: impl Into<SocketAddr>, engine: Arc<CacheEngine>) -> Result<Self> {
        let listener = TcpListener::bind(addr.into()).await?;
        Ok(Self { listener, engine })
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Server listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => {
                        // usually fd exhaustion; keep serving existing clients
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = &mut shutdown => {
                    info!("Server stopped accepting connections");
                    return Ok(());
                }
            }
        }
    }

    /// Accepts connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }

        let engine = Arc::clone(&self.engine);
        let span = info_span!("connection", %peer);

        tokio::spawn(
            async move {
                debug!("connection opened");
                match Connection::new(stream, engine).run().await {
                    Ok(()) => debug!("connection closed"),
                    Err(e) => debug!("connection closed with error: {}", e),
                }
            }
            .instrument(span),
        );
    }
}
