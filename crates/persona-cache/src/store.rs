//! Cache-aside reads and best-effort writes against the cache connection.

use crate::types::{CacheStats, CacheStatsSnapshot, Lookup, WriteOutcome};
use persona_store::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result cache backed by one managed store connection.
///
/// Never returns an error: store trouble turns reads into misses and writes
/// into [`WriteOutcome::Ignored`].
#[derive(Clone)]
pub struct ResultCache {
    manager: Arc<ConnectionManager>,
    stats: Arc<CacheStats>,
}

impl ResultCache {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Read and deserialize a cached payload.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let lease = match self.manager.acquire().await {
            Ok(lease) => lease,
            Err(unavailable) => {
                CacheStats::incr(&self.stats.unavailable);
                CacheStats::incr(&self.stats.misses);
                debug!(key = %key, reason = %unavailable, "Cache unavailable, treating as miss");
                return Lookup::Miss;
            }
        };

        match lease.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    CacheStats::incr(&self.stats.hits);
                    debug!(key = %key, "Cache hit");
                    Lookup::Hit(value)
                }
                Err(e) => {
                    CacheStats::incr(&self.stats.decode_failures);
                    CacheStats::incr(&self.stats.misses);
                    warn!(key = %key, error = %e, "Cached payload unreadable, treating as miss");
                    Lookup::Miss
                }
            },
            Ok(None) => {
                CacheStats::incr(&self.stats.misses);
                debug!(key = %key, "Cache miss");
                Lookup::Miss
            }
            Err(e) => {
                CacheStats::incr(&self.stats.errors);
                CacheStats::incr(&self.stats.misses);
                self.manager.report_failure(&lease, &e).await;
                Lookup::Miss
            }
        }
    }

    /// Serialize and store a payload for `ttl`.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> WriteOutcome {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => return self.ignored(key, format!("serialize: {}", e)),
        };

        let lease = match self.manager.acquire().await {
            Ok(lease) => lease,
            Err(unavailable) => return self.ignored(key, unavailable.to_string()),
        };

        match lease.set_ex(key, &payload, ttl).await {
            Ok(()) => {
                CacheStats::incr(&self.stats.writes);
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache write");
                WriteOutcome::Written
            }
            Err(e) => {
                CacheStats::incr(&self.stats.errors);
                self.manager.report_failure(&lease, &e).await;
                self.ignored(key, e.to_string())
            }
        }
    }

    fn ignored(&self, key: &str, reason: String) -> WriteOutcome {
        CacheStats::incr(&self.stats.ignored_writes);
        debug!(key = %key, reason = %reason, "Cache write skipped");
        WriteOutcome::Ignored { reason }
    }
}
