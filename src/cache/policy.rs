//! Eviction Policy Module
//!
//! Capability interface shared by every eviction strategy, plus the closed set
//! of strategies selectable from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::LruPolicy;

// == Eviction Policy ==
/// Decides which key leaves a partition when it is full.
///
/// An instance orders exactly one partition's key set. The partition keeps the
/// policy and its entry map in step, so every admitted key is also stored.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Marks `key` as just accessed. No-op for keys never admitted.
    fn touch(&mut self, key: &str);

    /// Starts tracking a new key as the most recently used one.
    ///
    /// When the policy is already at capacity it stops tracking a victim and
    /// returns it; the caller must drop the victim's entry.
    fn admit(&mut self, key: String) -> Option<String>;

    /// Stops tracking a deleted or expired key. No-op for unknown keys.
    fn remove(&mut self, key: &str);

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Maximum number of keys tracked before admission evicts.
    fn capacity(&self) -> usize;

    /// Whether `key` is currently tracked.
    fn contains(&self, key: &str) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Policy Kind ==
/// Eviction strategies selectable by name in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Least recently used
    #[default]
    Lru,
}

impl PolicyKind {
    /// Creates a policy instance sized to one partition.
    pub fn build(self, capacity: usize) -> Box<dyn EvictionPolicy> {
        match self {
            PolicyKind::Lru => Box::new(LruPolicy::new(capacity)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Lru => write!(f, "lru"),
        }
    }
}
