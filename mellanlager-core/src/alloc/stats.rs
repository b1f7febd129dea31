//! ## mellanlager-core::alloc::stats
//! **Per-pool allocation counters**
//!
//! Every freelist carries a `PoolStats` record tracking allocations,
//! frees, and chunk growth. Counters are relaxed atomics: tracking only,
//! never consulted on a decision path.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe allocation counters for one pool.
pub struct PoolStats {
    pub(crate) allocations: AtomicUsize,
    pub(crate) frees: AtomicUsize,
    pub(crate) chunks: AtomicUsize,
}

impl PoolStats {
    pub fn new() -> Self {
        Self {
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            chunks: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_free(&self) {
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_chunk_growth(&self) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
        }
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of a pool's counters, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub allocations: usize,
    pub frees: usize,
    pub chunks: usize,
}

impl PoolStatsSnapshot {
    /// Blocks currently issued and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.allocations.saturating_sub(self.frees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = PoolStats::new();
        for _ in 0..10 {
            stats.record_allocation();
        }
        for _ in 0..4 {
            stats.record_free();
        }
        stats.record_chunk_growth();

        let snap = stats.snapshot();
        assert_eq!(snap.allocations, 10);
        assert_eq!(snap.frees, 4);
        assert_eq!(snap.chunks, 1);
        assert_eq!(snap.outstanding(), 6);
    }
}
