//! In-process store for `memory://` deployments and tests.
//!
//! Supports fault injection so connection handling can be exercised without a
//! real server.

use async_trait::async_trait;
use persona_core::{Error, Result, StoreConnector, StoreHandle};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct Inner {
    values: HashMap<String, (String, Instant)>,
    sets: HashMap<String, HashSet<String>>,
    down: bool,
    failing_connects: u32,
    failing_ops: u32,
    connect_delay: Duration,
    connect_attempts: u64,
    op_calls: u64,
}

/// Shared in-memory key-value store.
///
/// Clones share state. Every connector created from the same store sees the
/// same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A connector opening handles onto this store.
    pub fn connector(&self) -> Arc<dyn StoreConnector> {
        Arc::new(MemoryConnector {
            store: self.clone(),
        })
    }

    /// While down, connects and commands fail.
    pub fn set_down(&self, down: bool) {
        self.lock().down = down;
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.lock().failing_connects = n;
    }

    /// Fail the next `n` commands.
    pub fn fail_next_ops(&self, n: u32) {
        self.lock().failing_ops = n;
    }

    /// Delay every connect attempt.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = delay;
    }

    pub fn connect_attempts(&self) -> u64 {
        self.lock().connect_attempts
    }

    pub fn op_calls(&self) -> u64 {
        self.lock().op_calls
    }

    /// Read a value directly, bypassing fault injection.
    pub fn raw_get(&self, key: &str) -> Option<String> {
        let inner = self.lock();
        inner
            .values
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone())
    }

    /// Remaining time to live of a key, if present.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let inner = self.lock();
        inner
            .values
            .get(key)
            .map(|(_, expires_at)| expires_at.saturating_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn set_members(&self, set: &str) -> HashSet<String> {
        self.lock().sets.get(set).cloned().unwrap_or_default()
    }

    pub fn key_count(&self) -> usize {
        self.lock().values.len()
    }

    fn begin_op(&self) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.op_calls += 1;
        if inner.down {
            return Err(Error::Store("memory store is down".to_string()));
        }
        if inner.failing_ops > 0 {
            inner.failing_ops -= 1;
            return Err(Error::Store("injected command failure".to_string()));
        }
        Ok(inner)
    }
}

struct MemoryConnector {
    store: MemoryStore,
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    async fn connect(&self) -> Result<Arc<dyn StoreHandle>> {
        let delay = {
            let mut inner = self.store.lock();
            inner.connect_attempts += 1;
            inner.connect_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.store.lock();
        if inner.down {
            return Err(Error::Store("connection refused".to_string()));
        }
        if inner.failing_connects > 0 {
            inner.failing_connects -= 1;
            return Err(Error::Store("injected connect failure".to_string()));
        }
        Ok(Arc::new(MemoryHandle {
            store: self.store.clone(),
            healthy: AtomicBool::new(true),
        }))
    }
}

struct MemoryHandle {
    store: MemoryStore,
    healthy: AtomicBool,
}

impl MemoryHandle {
    fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.healthy.store(false, Ordering::Relaxed);
        }
        result
    }

    fn op(&self) -> Result<MutexGuard<'_, Inner>> {
        if !self.healthy.load(Ordering::Relaxed) {
            return Err(Error::Store("connection closed".to_string()));
        }
        self.store.begin_op()
    }
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self.op().map(|mut inner| {
            let now = Instant::now();
            match inner.values.get(key) {
                Some((value, expires_at)) if now < *expires_at => Some(value.clone()),
                Some(_) => {
                    inner.values.remove(key);
                    None
                }
                None => None,
            }
        });
        self.guard(result)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let result = self.op().map(|mut inner| {
            inner
                .values
                .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        });
        self.guard(result)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool> {
        let result = self.op().map(|mut inner| {
            inner
                .sets
                .entry(set.to_string())
                .or_default()
                .insert(member.to_string())
        });
        self.guard(result)
    }

    async fn set_len(&self, set: &str) -> Result<u64> {
        let result = self
            .op()
            .map(|inner| inner.sets.get(set).map_or(0, |s| s.len() as u64));
        self.guard(result)
    }

    async fn close(&self) {
        self.healthy.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn handle(store: &MemoryStore) -> Arc<dyn StoreHandle> {
        store.connector().connect().await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_expire() {
        let store = MemoryStore::new();
        let conn = handle(&store).await;

        conn.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(conn.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(conn.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_add_reports_new_members() {
        let store = MemoryStore::new();
        let conn = handle(&store).await;

        assert!(conn.set_add("s", "a").await.unwrap());
        assert!(!conn.set_add("s", "a").await.unwrap());
        assert!(conn.set_add("s", "b").await.unwrap());
        assert_eq!(conn.set_len("s").await.unwrap(), 2);
        assert_eq!(conn.set_len("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure_marks_handle_unhealthy() {
        let store = MemoryStore::new();
        let conn = handle(&store).await;

        store.fail_next_ops(1);
        assert!(conn.get("k").await.is_err());
        assert!(!conn.is_healthy());
        // A broken handle stays broken.
        assert!(conn.get("k").await.is_err());

        let fresh = handle(&store).await;
        assert!(fresh.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_down_store_refuses_connects() {
        let store = MemoryStore::new();
        store.set_down(true);
        assert!(store.connector().connect().await.is_err());
        assert_eq!(store.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_connectors_share_data() {
        let store = MemoryStore::new();
        let a = handle(&store).await;
        let b = handle(&store).await;

        a.set_add("visitors", "v1").await.unwrap();
        assert_eq!(b.set_len("visitors").await.unwrap(), 1);
        assert!(store.set_members("visitors").contains("v1"));
    }
}
