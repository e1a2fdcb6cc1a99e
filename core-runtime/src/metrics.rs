//! Process-lifetime performance counters
//!
//! One `PerformanceMetrics` is created at bootstrap and shared (via `Arc`)
//! with every component that records into it. Counters only grow; `reset`
//! exists for tests and for an explicit operator request.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_requests: u64,
    pub background_syncs: u64,
}

impl MetricsSnapshot {
    /// Hits over lookups, `None` before the first lookup
    pub fn hit_rate(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses;
        (lookups > 0).then(|| self.cache_hits as f64 / lookups as f64)
    }
}

#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_requests: AtomicU64,
    background_syncs: AtomicU64,
}

impl PerformanceMetrics {
    /// Fresh counters, all zero
    pub fn init() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            background_syncs: self.background_syncs.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.network_requests.store(0, Ordering::Relaxed);
        self.background_syncs.store(0, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_request(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_sync(&self) {
        self.background_syncs.fetch_add(1, Ordering::Relaxed);
    }
}
