//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! expirations, per partition and across the whole engine.

use serde::Serialize;

use crate::cache::PolicyKind;
use crate::config::CacheMode;

// == Partition Stats ==
/// Counters kept by a single size-class partition.
///
/// Misses are not attributed to a partition since a lookup probes every
/// partition before a key is known to be absent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartitionStats {
    /// Largest value length this partition accepts
    pub max_value_length: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Current number of entries
    pub entries: usize,
    /// Successful GET lookups
    pub hits: u64,
    /// Entries dropped by the eviction policy
    pub evictions: u64,
    /// Entries removed after their TTL elapsed (lazily or by a sweep)
    pub expirations: u64,
}

impl PartitionStats {
    // == Constructor ==
    /// Creates zeroed counters for a partition.
    pub fn new(max_value_length: usize, capacity: usize) -> Self {
        Self {
            max_value_length,
            capacity,
            ..Self::default()
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_entries(&mut self, count: usize) {
        self.entries = count;
    }
}

// == Cache Stats ==
/// Engine-wide totals plus a per-partition breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Cleanup strategy in use
    pub mode: CacheMode,
    /// Eviction strategy in use
    pub policy: PolicyKind,
    /// Largest value accepted by SET
    pub max_value_length: usize,
    /// Number of successful GET lookups
    pub hits: u64,
    /// Number of GET lookups that found nothing valid
    pub misses: u64,
    /// Number of entries evicted due to capacity pressure
    pub evictions: u64,
    /// Number of entries removed after expiring
    pub expirations: u64,
    /// Current number of entries across all partitions
    pub total_entries: usize,
    /// Partitions in ascending size-class order
    pub partitions: Vec<PartitionStats>,
}

impl CacheStats {
    /// Sums partition counters into engine-wide totals.
    pub fn aggregate(
        mode: CacheMode,
        policy: PolicyKind,
        max_value_length: usize,
        misses: u64,
        partitions: Vec<PartitionStats>,
    ) -> Self {
        Self {
            mode,
            policy,
            max_value_length,
            hits: partitions.iter().map(|p| p.hits).sum(),
            misses,
            evictions: partitions.iter().map(|p| p.evictions).sum(),
            expirations: partitions.iter().map(|p| p.expirations).sum(),
            total_entries: partitions.iter().map(|p| p.entries).sum(),
            partitions,
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn partition(hits: u64, evictions: u64, expirations: u64, entries: usize) -> PartitionStats {
        PartitionStats {
            hits,
            evictions,
            expirations,
            entries,
            ..PartitionStats::new(10, 4)
        }
    }

    #[test]
    fn test_partition_stats_new() {
        let stats = PartitionStats::new(100, 8);
        assert_eq!(stats.max_value_length, 100);
        assert_eq!(stats.capacity, 8);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 0);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_partition_counters() {
        let mut stats = PartitionStats::new(10, 2);
        stats.record_hit();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_expirations(3);
        stats.set_entries(2);

        assert_eq!(stats.hits, 1);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_aggregate_sums_partitions() {
        let stats = CacheStats::aggregate(
            CacheMode::Simple,
            PolicyKind::Lru,
            100,
            5,
            vec![partition(3, 1, 0, 2), partition(2, 0, 4, 1)],
        );

        assert_eq!(stats.hits, 5);
        assert_eq!(stats.misses, 5);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.expirations, 4);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::aggregate(CacheMode::Simple, PolicyKind::Lru, 10, 0, vec![]);
        assert_eq!(stats.hit_rate(), 0.0);
    }
}
