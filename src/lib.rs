//! DCache - A size-tiered in-memory cache server
//!
//! Values are partitioned by size class so large and small entries are
//! evicted independently. Provides TTL expiration, pluggable eviction, a
//! line-oriented TCP protocol and a matching async client.

pub mod admin;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod server;
pub mod tasks;

pub use cache::{CacheEngine, CleanupMode, PolicyKind};
pub use client::CacheClient;
pub use config::{CacheMode, Config};
pub use error::{CacheError, Result};
pub use server::Server;
pub use tasks::spawn_sweep_task;
