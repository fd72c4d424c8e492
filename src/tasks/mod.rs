//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries at the configured interval
//!   (clean-interval mode only)

mod cleanup;

pub use cleanup::{spawn_sweep_task, spawn_sweep_task_every, SweepHandle};
