//! Cache policy, outcomes and statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_AUCTION_TTL: Duration = Duration::from_secs(60 * 60);

/// Time-to-live per payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub profile: Duration,
    pub auction: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE_TTL,
            auction: DEFAULT_AUCTION_TTL,
        }
    }
}

/// Result of a cache read.
///
/// A missing key, an unavailable store and an unreadable payload all read as
/// `Miss`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
}

impl<T> Lookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    pub fn into_hit(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
        }
    }
}

/// Result of a best-effort cache write.
///
/// `Ignored` is an expected outcome; callers log it at most.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Ignored { reason: String },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Reads answered as a miss because the store could not be acquired.
    pub unavailable: AtomicU64,
    /// Stored payloads that failed to deserialize.
    pub decode_failures: AtomicU64,
    /// Reads or writes that failed on an established connection.
    pub errors: AtomicU64,
    pub writes: AtomicU64,
    pub ignored_writes: AtomicU64,
}

impl CacheStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            ignored_writes: self.ignored_writes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub unavailable: u64,
    pub decode_failures: u64,
    pub errors: u64,
    pub writes: u64,
    pub ignored_writes: u64,
}

impl CacheStatsSnapshot {
    /// Hits over all reads, or 0.0 before the first read.
    pub fn hit_ratio(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}
