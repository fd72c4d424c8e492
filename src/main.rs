//! DCache - A size-tiered in-memory cache server
//!
//! Serves the cache protocol over TCP, with optional periodic expiry sweeps
//! and an optional HTTP admin surface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dcache::{admin, spawn_sweep_task, CacheEngine, Config, Server};

/// Size-tiered in-memory cache server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "DCACHE_CONFIG", default_value = "dcache.json")]
    config_file: PathBuf,

    /// Override the port from the configuration file
    #[arg(long, env = "SERVER_PORT")]
    port: Option<u16>,
}

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration; unknown modes or policies abort here
/// 3. Build the size-tiered cache engine
/// 4. Start the expiry sweep task (clean-interval mode only)
/// 5. Start the admin HTTP server if configured
/// 6. Serve the cache protocol until SIGINT/SIGTERM
/// 7. Stop the sweep task and admin server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DCache server");

    let args = Args::parse();
    let mut config = Config::from_file(&args.config_file)
        .with_context(|| format!("loading {}", args.config_file.display()))?;
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(
        "Configuration loaded: mode={}, policy={}, size_classes={:?}, max_value_length={}, port={}",
        config.cache,
        config.eviction_policy,
        config.size_cap_config,
        config.max_value_length(),
        config.port
    );

    let engine = Arc::new(CacheEngine::from_config(&config)?);
    info!("Cache engine initialized");

    let sweeper = spawn_sweep_task(engine.clone());

    let admin = match config.admin_port {
        Some(port) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            Some(
                admin::start(addr, engine.clone())
                    .await
                    .context("starting admin server")?,
            )
        }
        None => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let server = Server::bind(addr, engine)
        .await
        .with_context(|| format!("binding {}", addr))?;

    server.run_until(shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    if let Some(admin) = admin {
        admin.shutdown().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
