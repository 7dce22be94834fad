//! Unique-visitor tracking on the tracking connection.

use persona_core::{RetryPolicy, retry};
use persona_store::{ConnectionManager, Unavailable};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const VISITOR_SET_KEY: &str = "persona:visitors";

const RECORD_ATTEMPTS: u32 = 3;
const COUNT_ATTEMPTS: u32 = 2;
const RETRY_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
enum TrackError {
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
    #[error(transparent)]
    Store(#[from] persona_core::Error),
}

/// Records visitor ids in a store-side set and reports the set size.
///
/// Failures never propagate: an uncounted visit reads as "not new" and an
/// unreachable count reads as zero.
#[derive(Clone)]
pub struct VisitorTracker {
    manager: Arc<ConnectionManager>,
    set_key: String,
    record_policy: RetryPolicy,
    count_policy: RetryPolicy,
}

impl VisitorTracker {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            set_key: VISITOR_SET_KEY.to_string(),
            record_policy: RetryPolicy::linear(RECORD_ATTEMPTS, RETRY_STEP),
            count_policy: RetryPolicy::linear(COUNT_ATTEMPTS, RETRY_STEP),
        }
    }

    pub fn with_set_key(mut self, key: impl Into<String>) -> Self {
        self.set_key = key.into();
        self
    }

    pub fn with_policies(mut self, record: RetryPolicy, count: RetryPolicy) -> Self {
        self.record_policy = record;
        self.count_policy = count;
        self
    }

    /// Add `visitor_id` to the set. `true` only when this call inserted it.
    pub async fn record_visit(&self, visitor_id: &str) -> bool {
        let visitor_id = visitor_id.trim();
        if visitor_id.is_empty() {
            return false;
        }

        match retry(&self.record_policy, |_| self.try_add(visitor_id)).await {
            Ok(is_new) => {
                debug!(visitor = %visitor_id, is_new, "Visit recorded");
                is_new
            }
            Err(e) => {
                warn!(
                    visitor = %visitor_id,
                    attempts = self.record_policy.attempts(),
                    error = %e,
                    "Visit not counted"
                );
                false
            }
        }
    }

    /// Size of the visitor set, or 0 if the store cannot be reached.
    pub async fn total_unique_count(&self) -> u64 {
        match retry(&self.count_policy, |_| self.try_count()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(attempts = self.count_policy.attempts(), error = %e, "Visitor count unavailable");
                0
            }
        }
    }

    async fn try_add(&self, visitor_id: &str) -> Result<bool, TrackError> {
        let lease = self.manager.acquire().await?;
        match lease.set_add(&self.set_key, visitor_id).await {
            Ok(is_new) => Ok(is_new),
            Err(e) => {
                // Start the next attempt from a fresh connection.
                self.manager.invalidate(&lease).await;
                Err(e.into())
            }
        }
    }

    async fn try_count(&self) -> Result<u64, TrackError> {
        let lease = self.manager.acquire().await?;
        match lease.set_len(&self.set_key).await {
            Ok(count) => Ok(count),
            Err(e) => {
                self.manager.invalidate(&lease).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_store::{ConnectionState, MemoryStore, StoreConfig};

    fn tracker(store: &MemoryStore) -> VisitorTracker {
        let config = StoreConfig::default()
            .with_connect_attempts(1)
            .with_cooldown(Duration::from_secs(5));
        VisitorTracker::new(Arc::new(ConnectionManager::new(
            "tracking",
            store.connector(),
            config,
        )))
    }

    #[tokio::test]
    async fn test_record_visit_is_idempotent() {
        let store = MemoryStore::new();
        let tracker = tracker(&store);

        assert!(tracker.record_visit("visitor-1").await);
        assert!(!tracker.record_visit("visitor-1").await);
        assert!(tracker.record_visit("visitor-2").await);
        assert_eq!(tracker.total_unique_count().await, 2);
    }

    #[tokio::test]
    async fn test_blank_id_is_not_counted() {
        let store = MemoryStore::new();
        let tracker = tracker(&store);
        assert!(!tracker.record_visit("   ").await);
        assert_eq!(store.op_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_handle_is_replaced_mid_retry() {
        let store = MemoryStore::new();
        let tracker = tracker(&store);
        assert!(tracker.record_visit("warmup").await);

        store.fail_next_ops(1);
        assert!(tracker.record_visit("visitor-1").await);
        assert_eq!(store.connect_attempts(), 2);
        assert_eq!(tracker.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_false() {
        let store = MemoryStore::new();
        store.set_down(true);
        let tracker = tracker(&store);

        assert!(!tracker.record_visit("visitor-1").await);
        assert!(store.set_members(VISITOR_SET_KEY).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_is_zero_when_unreachable() {
        let tracker = VisitorTracker::new(Arc::new(ConnectionManager::disabled("tracking")));
        assert_eq!(tracker.total_unique_count().await, 0);
        assert!(!tracker.record_visit("v").await);
    }

    #[tokio::test]
    async fn test_custom_set_key() {
        let store = MemoryStore::new();
        let tracker = tracker(&store).with_set_key("visitors:test");
        tracker.record_visit("a").await;
        assert!(store.set_members("visitors:test").contains("a"));
    }
}
