//! Routing and rewrite counters.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use once_cell::sync::Lazy;

static STATS: Lazy<Stats> = Lazy::new(Stats::default);

/// Process-wide counters exported to observability hooks.
#[derive(Debug, Default)]
pub struct Stats {
    routed: AtomicU64,
    degraded: AtomicU64,
    broadcast: AtomicU64,
    generated_keys: AtomicU64,
}

/// Global stats instance.
pub fn stats() -> &'static Stats {
    &STATS
}

impl Stats {
    pub(crate) fn statement_routed(&self) {
        self.routed.fetch_add(1, Relaxed);
    }

    /// Extractor gave up and the statement was routed everywhere.
    pub(crate) fn route_degraded(&self) {
        self.degraded.fetch_add(1, Relaxed);
    }

    pub(crate) fn broadcast_route(&self) {
        self.broadcast.fetch_add(1, Relaxed);
    }

    pub(crate) fn key_generated(&self) {
        self.generated_keys.fetch_add(1, Relaxed);
    }

    pub fn routed(&self) -> u64 {
        self.routed.load(Relaxed)
    }

    pub fn degraded(&self) -> u64 {
        self.degraded.load(Relaxed)
    }

    pub fn broadcast(&self) -> u64 {
        self.broadcast.load(Relaxed)
    }

    pub fn generated_keys(&self) -> u64 {
        self.generated_keys.load(Relaxed)
    }
}
