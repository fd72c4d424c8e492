//! Cache Module
//!
//! Size-tiered in-memory caching with TTL expiration and pluggable eviction.

mod engine;
mod entry;
mod lru;
mod partition;
mod policy;
mod stats;


// Re-export public types
pub use engine::{CacheEngine, CleanupMode};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lru::LruPolicy;
pub use partition::Partition;
pub use policy::{EvictionPolicy, PolicyKind};
pub use stats::{CacheStats, PartitionStats};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
