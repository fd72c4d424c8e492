//! Partition Module
//!
//! One size class of the cache: a bounded key-value map whose eviction order is
//! delegated to an [`EvictionPolicy`].

use std::collections::HashMap;

use bytes::Bytes;
use tracing::trace;

use crate::cache::{current_timestamp_ms, CacheEntry, EvictionPolicy, PartitionStats, PolicyKind};

// == Partition ==
/// Bounded storage for values up to `max_value_length` bytes.
///
/// The entry map and the policy are always mutated together, so a key is
/// tracked by the policy exactly when it has an entry.
#[derive(Debug)]
pub struct Partition {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Eviction order over `entries`
    policy: Box<dyn EvictionPolicy>,
    /// Per-partition counters
    stats: PartitionStats,
}

impl Partition {
    // == Constructor ==
    /// Creates an empty partition holding at most `capacity` entries.
    pub fn new(max_value_length: usize, capacity: usize, policy: PolicyKind) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            policy: policy.build(capacity),
            stats: PartitionStats::new(max_value_length, capacity),
        }
    }

    /// Largest value length routed to this partition.
    pub fn max_value_length(&self) -> usize {
        self.stats.max_value_length
    }

    // == Put ==
    /// Stores a value, replacing any existing one under the same key.
    ///
    /// Replacing resets the TTL and counts as a touch. Inserting a new key into
    /// a full partition evicts the policy's victim first; the evicted key is
    /// returned.
    pub fn put(&mut self, key: String, value: Bytes, ttl_seconds: u32) -> Option<String> {
        let entry = CacheEntry::new(value, ttl_seconds);

        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = entry;
            self.policy.touch(&key);
            return None;
        }

        let victim = self.policy.admit(key.clone());
        if let Some(evicted) = &victim {
            self.entries.remove(evicted);
            self.stats.record_eviction();
            trace!(key = %evicted, partition = self.max_value_length(), "evicted entry");
        }

        self.entries.insert(key, entry);
        self.sync_len();
        victim
    }

    // == Get ==
    /// Retrieves a live value and marks it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        if self.expire_if_stale(key) {
            return None;
        }

        let value = self.entries.get(key)?.value.clone();
        self.policy.touch(key);
        self.stats.record_hit();
        Some(value)
    }

    // == Has ==
    /// Checks for a live value without changing eviction order.
    ///
    /// Applies the same lazy expiration as [`Partition::get`].
    pub fn has(&mut self, key: &str) -> bool {
        !self.expire_if_stale(key) && self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry. Returns whether anything was stored under `key`.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.policy.remove(key);
        self.sync_len();
        removed
    }

    // == Cleanup Expired ==
    /// Removes every entry that has expired as of `now_ms`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, now_ms: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.policy.remove(key);
        }

        self.stats.record_expirations(expired_keys.len());
        self.sync_len();
        expired_keys.len()
    }

    // == Stats ==
    /// Returns a snapshot of this partition's counters.
    pub fn stats(&self) -> PartitionStats {
        self.stats.clone()
    }

    // == Length ==
    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys the eviction policy is tracking.
    pub fn tracked_len(&self) -> usize {
        self.policy.len()
    }

    /// Removes `key` if its TTL has elapsed. Returns true when it did.
    fn expire_if_stale(&mut self, key: &str) -> bool {
        let now = current_timestamp_ms();
        let stale = matches!(self.entries.get(key), Some(entry) if entry.is_expired_at(now));

        if stale {
            self.entries.remove(key);
            self.policy.remove(key);
            self.stats.record_expirations(1);
            self.sync_len();
        }

        stale
    }

    fn sync_len(&mut self) {
        debug_assert_eq!(self.entries.len(), self.policy.len());
        self.stats.set_entries(self.entries.len());
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn bytes(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_partition_new() {
        let partition = Partition::new(10, 4, PolicyKind::Lru);
        assert_eq!(partition.len(), 0);
        assert!(partition.is_empty());
        assert_eq!(partition.max_value_length(), 10);
    }

    #[test]
    fn test_partition_put_and_get() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);

        assert_eq!(partition.put("key1".to_string(), bytes("value1"), 0), None);

        assert_eq!(partition.get("key1"), Some(bytes("value1")));
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.stats().hits, 1);
    }

    #[test]
    fn test_partition_get_nonexistent() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);
        assert_eq!(partition.get("nonexistent"), None);
        assert!(!partition.has("nonexistent"));
    }

    #[test]
    fn test_partition_overwrite() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);

        partition.put("key1".to_string(), bytes("value1"), 0);
        partition.put("key1".to_string(), bytes("value2"), 0);

        assert_eq!(partition.get("key1"), Some(bytes("value2")));
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.tracked_len(), 1);
    }

    #[test]
    fn test_partition_delete() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);

        partition.put("key1".to_string(), bytes("value1"), 0);
        assert!(partition.delete("key1"));

        assert!(partition.is_empty());
        assert_eq!(partition.tracked_len(), 0);
        assert_eq!(partition.get("key1"), None);
        assert!(!partition.delete("key1"));
    }

    #[test]
    fn test_partition_lru_eviction() {
        let mut partition = Partition::new(10, 2, PolicyKind::Lru);

        partition.put("a".to_string(), bytes("xxxxx"), 0);
        partition.put("b".to_string(), bytes("yyyyy"), 0);
        let evicted = partition.put("c".to_string(), bytes("zzzzz"), 0);

        assert_eq!(evicted, Some("a".to_string()));
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.get("a"), None);
        assert!(partition.get("b").is_some());
        assert!(partition.get("c").is_some());
        assert_eq!(partition.stats().evictions, 1);
    }

    #[test]
    fn test_partition_get_touches() {
        let mut partition = Partition::new(10, 2, PolicyKind::Lru);

        partition.put("a".to_string(), bytes("1"), 0);
        partition.put("b".to_string(), bytes("2"), 0);
        partition.get("a");

        assert_eq!(partition.put("c".to_string(), bytes("3"), 0), Some("b".to_string()));
        assert!(partition.has("a"));
    }

    #[test]
    fn test_partition_overwrite_touches() {
        let mut partition = Partition::new(10, 2, PolicyKind::Lru);

        partition.put("a".to_string(), bytes("1"), 0);
        partition.put("b".to_string(), bytes("2"), 0);
        partition.put("a".to_string(), bytes("3"), 0);

        assert_eq!(partition.put("c".to_string(), bytes("4"), 0), Some("b".to_string()));
    }

    #[test]
    fn test_partition_has_does_not_touch() {
        let mut partition = Partition::new(10, 2, PolicyKind::Lru);

        partition.put("a".to_string(), bytes("1"), 0);
        partition.put("b".to_string(), bytes("2"), 0);
        for _ in 0..5 {
            assert!(partition.has("a"));
        }

        assert_eq!(partition.put("c".to_string(), bytes("3"), 0), Some("a".to_string()));
        assert_eq!(partition.stats().hits, 0);
    }

    #[test]
    fn test_partition_lazy_expiration() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);

        partition.put("get_me".to_string(), bytes("v"), 1);
        partition.put("has_me".to_string(), bytes("v"), 1);
        assert!(partition.has("get_me"));

        sleep(Duration::from_millis(1100));

        // still stored until accessed
        assert_eq!(partition.len(), 2);

        assert_eq!(partition.get("get_me"), None);
        assert!(!partition.has("has_me"));
        assert_eq!(partition.len(), 0);
        assert_eq!(partition.tracked_len(), 0);
        assert_eq!(partition.stats().expirations, 2);
    }

    #[test]
    fn test_partition_cleanup_expired() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);

        partition.put("key1".to_string(), bytes("value1"), 1);
        partition.put("key2".to_string(), bytes("value2"), 10);
        partition.put("key3".to_string(), bytes("value3"), 0);

        sleep(Duration::from_millis(1100));

        let removed = partition.cleanup_expired(current_timestamp_ms());
        assert_eq!(removed, 1);
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.tracked_len(), 2);
        assert!(partition.get("key2").is_some());
        assert!(partition.get("key3").is_some());
    }

    #[test]
    fn test_partition_overwrite_resets_ttl() {
        let mut partition = Partition::new(10, 4, PolicyKind::Lru);

        partition.put("key".to_string(), bytes("old"), 1);
        partition.put("key".to_string(), bytes("new"), 0);

        sleep(Duration::from_millis(1100));

        assert_eq!(partition.get("key"), Some(bytes("new")));
    }
}
