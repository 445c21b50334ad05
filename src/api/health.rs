//! Shared health counters for the /health endpoint.
//! Updated by the fetcher and the projection service.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub builds_ok: AtomicU64,
    pub builds_failed: AtomicU64,
    /// Individual upstream candidate failures (non-OK, network error, timeout).
    pub upstream_failures: AtomicU64,
    /// Unix ms of the last successful build (0 = none yet).
    pub last_build_at_ms: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_build(&self, at_ms: u64) {
        self.builds_ok.fetch_add(1, Ordering::Relaxed);
        self.last_build_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn record_build_failure(&self) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn builds_ok(&self) -> u64 {
        self.builds_ok.load(Ordering::Relaxed)
    }

    pub fn builds_failed(&self) -> u64 {
        self.builds_failed.load(Ordering::Relaxed)
    }

    pub fn upstream_failures(&self) -> u64 {
        self.upstream_failures.load(Ordering::Relaxed)
    }

    pub fn last_build_at_ms(&self) -> u64 {
        self.last_build_at_ms.load(Ordering::Relaxed)
    }
}
