//! Cache Engine Module
//!
//! Routes operations to size-class partitions and enforces the global maximum
//! value length.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheStats, Partition, PolicyKind};
use crate::config::{CacheMode, Config};
use crate::error::{CacheError, Result};

/// Number of key lock stripes serializing writers of the same key
const KEY_LOCK_STRIPES: usize = 64;

// == Cleanup Mode ==
/// When memory held by expired entries is reclaimed.
///
/// Lookups expire stale entries lazily in both modes, so the two answer every
/// GET/HAS/DELETE identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    /// Expired entries are removed only when accessed or evicted
    Simple,
    /// A background sweep also removes expired entries every interval
    CleanInterval(Duration),
}

impl CleanupMode {
    /// Sweep period, if this mode runs one.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self {
            CleanupMode::Simple => None,
            CleanupMode::CleanInterval(interval) => Some(*interval),
        }
    }

    /// Configuration name of this mode.
    pub fn kind(&self) -> CacheMode {
        match self {
            CleanupMode::Simple => CacheMode::Simple,
            CleanupMode::CleanInterval(_) => CacheMode::CleanInterval,
        }
    }
}

// == Cache Engine ==
/// Size-tiered cache shared by every connection task.
///
/// Each partition sits behind its own lock. Operations lock one partition at
/// a time, so different size classes proceed concurrently and no task ever
/// holds two partition locks.
///
/// SET and DELETE span several partitions, so they also hold the key's
/// stripe lock for their whole duration. A stripe is always taken before
/// any partition lock.
#[derive(Debug)]
pub struct CacheEngine {
    /// Partitions in ascending `max_value_length` order
    partitions: Vec<Mutex<Partition>>,
    /// Writer exclusion per key hash, held across a multi-partition write
    key_locks: Vec<Mutex<()>>,
    /// Boundaries mirroring `partitions`, readable without locking
    boundaries: Vec<usize>,
    policy: PolicyKind,
    cleanup: CleanupMode,
    misses: AtomicU64,
}

impl CacheEngine {
    // == Constructor ==
    /// Builds one partition per entry of the size-class table
    /// `{ max_value_length -> max_entry_count }`.
    pub fn new(
        size_classes: &BTreeMap<usize, usize>,
        policy: PolicyKind,
        cleanup: CleanupMode,
    ) -> Result<Self> {
        if size_classes.is_empty() {
            return Err(CacheError::InvalidConfig(
                "size class table is empty".to_string(),
            ));
        }

        if let Some((boundary, _)) = size_classes.iter().find(|(_, &cap)| cap == 0) {
            return Err(CacheError::InvalidConfig(format!(
                "size class {} has zero capacity",
                boundary
            )));
        }

        // BTreeMap iterates in ascending key order
        let boundaries: Vec<usize> = size_classes.keys().copied().collect();
        let partitions = size_classes
            .iter()
            .map(|(&max_len, &capacity)| Mutex::new(Partition::new(max_len, capacity, policy)))
            .collect();

        Ok(Self {
            partitions,
            key_locks: (0..KEY_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            boundaries,
            policy,
            cleanup,
            misses: AtomicU64::new(0),
        })
    }

    /// Creates an engine from validated server configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.size_cap_config,
            config.eviction_policy,
            config.cleanup_mode()?,
        )
    }

    /// Largest value length any SET may carry.
    pub fn max_value_length(&self) -> usize {
        // non-empty by construction
        self.boundaries.last().copied().unwrap_or(0)
    }

    pub fn cleanup_mode(&self) -> CleanupMode {
        self.cleanup
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    /// Size-class boundaries in ascending order.
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Index of the smallest size class that fits `len` bytes.
    fn partition_index(&self, len: usize) -> Option<usize> {
        self.boundaries.iter().position(|&max_len| len <= max_len)
    }

    fn key_lock(&self, key: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.key_locks[(hasher.finish() as usize) % self.key_locks.len()]
    }

    // == Set ==
    /// Stores `value` under `key` in the size class matching its length.
    ///
    /// A `ttl_seconds` of zero stores the value without expiration. Any copy of
    /// `key` held by another size class is removed first, so a key lives in at
    /// most one partition even under concurrent writers.
    pub async fn set(&self, key: String, value: Bytes, ttl_seconds: u32) -> Result<()> {
        let len = value.len();
        let max = self.max_value_length();
        if len > max {
            return Err(CacheError::ValueTooLarge { len, max });
        }

        let target = self
            .partition_index(len)
            .ok_or(CacheError::NoSizeClass(len))?;

        let _writer = self.key_lock(&key).lock().await;

        for (idx, partition) in self.partitions.iter().enumerate() {
            if idx != target {
                partition.lock().await.delete(&key);
            }
        }

        let evicted = self.partitions[target]
            .lock()
            .await
            .put(key, value, ttl_seconds);

        if let Some(evicted) = evicted {
            debug!(
                key = %evicted,
                size_class = self.boundaries[target],
                "partition full, evicted least recently used entry"
            );
        }

        Ok(())
    }

    // == Get ==
    /// Retrieves a live value, probing size classes in ascending order.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        for partition in &self.partitions {
            if let Some(value) = partition.lock().await.get(key) {
                return Some(value);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    // == Has ==
    /// Checks whether a live value exists without affecting eviction order.
    pub async fn has(&self, key: &str) -> bool {
        for partition in &self.partitions {
            if partition.lock().await.has(key) {
                return true;
            }
        }

        false
    }

    // == Delete ==
    /// Removes `key` from every size class. Returns whether anything was removed.
    ///
    /// Deleting an absent key is a successful no-op.
    pub async fn delete(&self, key: &str) -> bool {
        let _writer = self.key_lock(key).lock().await;

        let mut removed = false;
        for partition in &self.partitions {
            removed |= partition.lock().await.delete(key);
        }
        removed
    }

    // == Sweep ==
    /// Removes every expired entry from every partition.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;

        for partition in &self.partitions {
            removed += partition.lock().await.cleanup_expired(now);
        }

        removed
    }

    // == Stats ==
    /// Returns engine-wide and per-partition counters.
    pub async fn stats(&self) -> CacheStats {
        let mut partitions = Vec::with_capacity(self.partitions.len());
        for partition in &self.partitions {
            partitions.push(partition.lock().await.stats());
        }

        CacheStats::aggregate(
            self.cleanup.kind(),
            self.policy,
            self.max_value_length(),
            self.misses.load(Ordering::Relaxed),
            partitions,
        )
    }

    // == Length ==
    /// Total stored entries, expired-but-unreclaimed ones included.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for partition in &self.partitions {
            total += partition.lock().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stored entry count of the size class with boundary `max_value_length`.
    pub async fn partition_len(&self, max_value_length: usize) -> Option<usize> {
        let idx = self.boundaries.binary_search(&max_value_length).ok()?;
        Some(self.partitions[idx].lock().await.len())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn table(classes: &[(usize, usize)]) -> BTreeMap<usize, usize> {
        classes.iter().copied().collect()
    }

    fn engine(cleanup: CleanupMode) -> CacheEngine {
        CacheEngine::new(&table(&[(10, 2), (100, 1)]), PolicyKind::Lru, cleanup).unwrap()
    }

    fn value(byte: u8, len: usize) -> Bytes {
        Bytes::from(vec![byte; len])
    }

    #[test]
    fn test_engine_rejects_empty_table() {
        let result = CacheEngine::new(&BTreeMap::new(), PolicyKind::Lru, CleanupMode::Simple);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_engine_rejects_zero_capacity() {
        let result = CacheEngine::new(&table(&[(10, 0)]), PolicyKind::Lru, CleanupMode::Simple);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_max_value_length_is_largest_boundary() {
        let engine = engine(CleanupMode::Simple);
        assert_eq!(engine.max_value_length(), 100);
        assert_eq!(engine.boundaries(), &[10, 100]);
    }

    #[tokio::test]
    async fn test_small_partition_evicts_independently() {
        let engine = engine(CleanupMode::Simple);

        engine.set("a".to_string(), value(b'x', 5), 0).await.unwrap();
        engine.set("b".to_string(), value(b'y', 5), 0).await.unwrap();
        engine.set("c".to_string(), value(b'z', 5), 0).await.unwrap();

        assert_eq!(engine.get("a").await, None);
        assert_eq!(engine.get("b").await, Some(value(b'y', 5)));
        assert_eq!(engine.get("c").await, Some(value(b'z', 5)));
        assert_eq!(engine.partition_len(10).await, Some(2));
    }

    #[tokio::test]
    async fn test_large_value_routes_to_large_partition() {
        let engine = engine(CleanupMode::Simple);

        engine.set("big".to_string(), value(b'v', 50), 0).await.unwrap();

        assert_eq!(engine.partition_len(100).await, Some(1));
        assert_eq!(engine.partition_len(10).await, Some(0));
        assert_eq!(engine.get("big").await, Some(value(b'v', 50)));
    }

    #[tokio::test]
    async fn test_value_too_large() {
        let engine = engine(CleanupMode::Simple);

        let result = engine.set("huge".to_string(), value(b'v', 200), 0).await;
        assert!(matches!(
            result,
            Err(CacheError::ValueTooLarge { len: 200, max: 100 })
        ));
        assert!(engine.is_empty().await);
    }

    #[tokio::test]
    async fn test_boundary_is_inclusive() {
        let engine = engine(CleanupMode::Simple);

        engine.set("edge".to_string(), value(b'e', 10), 0).await.unwrap();
        engine.set("over".to_string(), value(b'o', 11), 0).await.unwrap();
        engine.set("max".to_string(), value(b'm', 100), 0).await.unwrap();

        assert_eq!(engine.partition_len(10).await, Some(1));
        // "max" displaced "over" from the single-slot class
        assert_eq!(engine.partition_len(100).await, Some(1));
        assert!(engine.has("edge").await);
        assert!(!engine.has("over").await);
        assert!(engine.has("max").await);
    }

    #[tokio::test]
    async fn test_empty_value_routes_to_smallest_class() {
        let engine =
            CacheEngine::new(&table(&[(0, 1), (10, 1)]), PolicyKind::Lru, CleanupMode::Simple)
                .unwrap();

        engine.set("empty".to_string(), Bytes::new(), 0).await.unwrap();

        assert_eq!(engine.partition_len(0).await, Some(1));
        assert_eq!(engine.get("empty").await, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn test_reset_moves_key_between_classes() {
        let engine = engine(CleanupMode::Simple);

        engine.set("k".to_string(), value(b's', 5), 0).await.unwrap();
        engine.set("k".to_string(), value(b'l', 50), 0).await.unwrap();

        assert_eq!(engine.partition_len(10).await, Some(0));
        assert_eq!(engine.partition_len(100).await, Some(1));
        assert_eq!(engine.get("k").await, Some(value(b'l', 50)));
    }

    #[tokio::test]
    async fn test_delete() {
        let engine = engine(CleanupMode::Simple);

        engine.set("k".to_string(), value(b'v', 3), 0).await.unwrap();
        assert!(engine.delete("k").await);
        assert_eq!(engine.get("k").await, None);
        assert!(!engine.delete("k").await);
    }

    #[tokio::test]
    async fn test_expiration_identical_across_modes() {
        for mode in [
            CleanupMode::Simple,
            CleanupMode::CleanInterval(Duration::from_secs(60)),
        ] {
            let engine = engine(mode);
            engine.set("k".to_string(), value(b'v', 1), 1).await.unwrap();

            assert!(engine.has("k").await);
            assert!(engine.get("k").await.is_some());

            tokio::time::sleep(Duration::from_millis(1100)).await;

            assert!(!engine.has("k").await);
            assert_eq!(engine.get("k").await, None);
        }
    }

    #[tokio::test]
    async fn test_sweep_expired_reclaims_memory() {
        let engine = engine(CleanupMode::CleanInterval(Duration::from_secs(1)));

        engine.set("short".to_string(), value(b'v', 1), 1).await.unwrap();
        engine.set("forever".to_string(), value(b'v', 1), 0).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(engine.partition_len(10).await, Some(2));
        assert_eq!(engine.sweep_expired().await, 1);
        assert_eq!(engine.partition_len(10).await, Some(1));
    }

    #[tokio::test]
    async fn test_stats_counts_hits_and_misses() {
        let engine = engine(CleanupMode::Simple);

        engine.set("k".to_string(), value(b'v', 1), 0).await.unwrap();
        engine.get("k").await;
        engine.get("missing").await;
        engine.has("missing").await;

        let stats = engine.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.partitions.len(), 2);
        assert_eq!(stats.mode, CacheMode::Simple);
        assert_eq!(stats.max_value_length, 100);
    }

    #[tokio::test]
    async fn test_concurrent_sets_across_classes_keep_one_copy() {
        let engine = std::sync::Arc::new(engine(CleanupMode::Simple));

        // park the small class so the first writer stalls mid-purge
        let small = engine.partitions[0].lock().await;

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.set("k".to_string(), value(b'l', 50), 0).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = tokio::spawn({
            let engine = engine.clone();
            async move { engine.set("k".to_string(), value(b's', 5), 0).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(small);
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(engine.partition_len(10).await, Some(1));
        assert_eq!(engine.partition_len(100).await, Some(0));
        assert_eq!(engine.get("k").await, Some(value(b's', 5)));

        // filling the small class must not resurface an older value
        for i in 0..4 {
            engine.set(format!("fill{}", i), value(b'f', 5), 0).await.unwrap();
        }
        assert_eq!(engine.get("k").await, None);
    }

    #[tokio::test]
    async fn test_delete_waits_for_inflight_set() {
        let engine = std::sync::Arc::new(engine(CleanupMode::Simple));

        let small = engine.partitions[0].lock().await;

        let set = tokio::spawn({
            let engine = engine.clone();
            async move { engine.set("k".to_string(), value(b'l', 50), 0).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let delete = tokio::spawn({
            let engine = engine.clone();
            async move { engine.delete("k").await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(small);
        set.await.unwrap().unwrap();
        assert!(delete.await.unwrap());

        assert_eq!(engine.get("k").await, None);
        assert!(engine.is_empty().await);
    }

    #[test]
    fn test_cleanup_mode_interval() {
        assert_eq!(CleanupMode::Simple.sweep_interval(), None);
        assert_eq!(
            CleanupMode::CleanInterval(Duration::from_secs(2)).sweep_interval(),
            Some(Duration::from_secs(2))
        );
    }
}
