//! Admin Module
//!
//! Optional HTTP surface for health checks and cache statistics.
//!
//! # Endpoints
//! - `GET /health` - Liveness check
//! - `GET /stats` - Engine-wide and per size-class statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::CacheEngine;
use crate::error::Result;

/// Handle returned by [`start`] for shutdown coordination.
pub struct AdminHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl AdminHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the admin server to shut down and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join_handle.await {
            warn!("Admin server task ended abnormally: {}", e);
        }
    }
}

/// Binds the admin listener and serves it on a background task.
pub async fn start(addr: SocketAddr, engine: Arc<CacheEngine>) -> Result<AdminHandle> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let app = create_router(AppState::new(engine));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        info!("Admin server listening on http://{}", local_addr);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;

        if let Err(e) = result {
            error!("Admin server error: {}", e);
        }
    });

    Ok(AdminHandle {
        local_addr,
        shutdown_tx,
        join_handle,
    })
}
