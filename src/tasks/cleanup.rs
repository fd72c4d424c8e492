//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries when the
//! engine runs in clean-interval mode.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;

/// Handle to a running sweep task, used to stop it on shutdown.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Signals the task to exit and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join_handle.await {
            warn!("Sweep task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

/// Starts the sweep task if the engine's cleanup mode calls for one.
///
/// Returns `None` in simple mode, where expiration stays purely lazy.
pub fn spawn_sweep_task(engine: Arc<CacheEngine>) -> Option<SweepHandle> {
    let interval = engine.cleanup_mode().sweep_interval()?;
    Some(spawn_sweep_task_every(engine, interval))
}

/// Spawns a task that sweeps every partition once per `interval`.
///
/// The task sweeps one partition at a time, holding each partition's lock
/// only for that partition's pass.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task_every(engine.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// handle.shutdown().await;
/// ```
pub fn spawn_sweep_task_every(engine: Arc<CacheEngine>, interval: Duration) -> SweepHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join_handle = tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {:?}",
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let removed = engine.sweep_expired().await;

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }

        info!("Expiry sweep task stopped");
    });

    SweepHandle {
        shutdown_tx,
        join_handle,
    }
}
