//! Counters for store connection observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one managed connection.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Individual connect attempts, including retries inside one acquire.
    pub connect_attempts: AtomicU64,
    /// Connects that produced a usable handle.
    pub connects: AtomicU64,
    /// Acquires that exhausted their connect attempts.
    pub connect_failures: AtomicU64,
    /// Transitions into cooldown.
    pub cooldowns: AtomicU64,
    /// Acquires refused without touching the store.
    pub short_circuits: AtomicU64,
    /// Command failures reported by callers on an established connection.
    pub op_failures: AtomicU64,
    /// Handles force-closed by callers.
    pub invalidations: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown(&self) {
        self.cooldowns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_short_circuit(&self) {
        self.short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_op_failure(&self) {
        self.op_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            cooldowns: self.cooldowns.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            op_failures: self.op_failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub connects: u64,
    pub connect_failures: u64,
    pub cooldowns: u64,
    pub short_circuits: u64,
    pub op_failures: u64,
    pub invalidations: u64,
}
