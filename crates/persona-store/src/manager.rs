//! Cooldown-based connection state machine.

use crate::config::StoreConfig;
use crate::health::HealthCheck;
use crate::memory::MemoryStore;
use crate::metrics::StoreMetrics;
use crate::redis::RedisConnector;
use persona_core::{Error, Result, RetryPolicy, StoreConnector, StoreHandle, retry};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const CACHE_CONNECTION: &str = "cache";
pub const TRACKING_CONNECTION: &str = "tracking";

/// Lifecycle of a managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Cooldown,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `acquire` could not hand out a connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Unavailable {
    #[error("no store configured")]
    NotConfigured,

    #[error("store cooling down for another {}ms", .remaining.as_millis())]
    CoolingDown { remaining: Duration },

    #[error("connection attempt already in flight")]
    ConnectInFlight,

    #[error("connect failed after {attempts} attempts: {reason}")]
    ConnectFailed { attempts: u32, reason: String },
}

/// A connection handed out by [`ConnectionManager::acquire`].
///
/// Dereferences to the store handle. The generation ties failure reports to
/// the connection they were observed on, so a report against a replaced
/// connection is ignored.
#[derive(Clone)]
pub struct Lease {
    handle: Arc<dyn StoreHandle>,
    generation: u64,
}

impl Lease {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Deref for Lease {
    type Target = dyn StoreHandle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref()
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("generation", &self.generation)
            .field("healthy", &self.handle.is_healthy())
            .finish()
    }
}

struct Slot {
    state: ConnectionState,
    handle: Option<Arc<dyn StoreHandle>>,
    generation: u64,
    cooldown_started_at: Option<Instant>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            handle: None,
            generation: 0,
            cooldown_started_at: None,
        }
    }

    fn enter_cooldown(&mut self, metrics: &StoreMetrics) -> Option<Arc<dyn StoreHandle>> {
        self.state = ConnectionState::Cooldown;
        self.cooldown_started_at = Some(Instant::now());
        metrics.record_cooldown();
        self.handle.take()
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets a `Connecting` slot if the connect future is dropped midway.
struct ConnectingGuard<'a> {
    slot: &'a Mutex<Slot>,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = lock(self.slot);
            if slot.state == ConnectionState::Connecting {
                slot.state = ConnectionState::Disconnected;
            }
        }
    }
}

/// Owns one store connection and decides when it may be (re)established.
pub struct ConnectionManager {
    name: String,
    connector: Option<Arc<dyn StoreConnector>>,
    config: StoreConfig,
    slot: Mutex<Slot>,
    metrics: Arc<StoreMetrics>,
}

impl ConnectionManager {
    pub fn new(
        name: impl Into<String>,
        connector: Arc<dyn StoreConnector>,
        config: StoreConfig,
    ) -> Self {
        Self {
            name: name.into(),
            connector: Some(connector),
            config,
            slot: Mutex::new(Slot::new()),
            metrics: StoreMetrics::new(),
        }
    }

    /// A manager with no store behind it. Every acquire is `NotConfigured`.
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connector: None,
            config: StoreConfig::default(),
            slot: Mutex::new(Slot::new()),
            metrics: StoreMetrics::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_configured(&self) -> bool {
        self.connector.is_some()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.slot).state
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    pub fn health_check(&self) -> HealthCheck {
        HealthCheck::from_state(
            &self.name,
            self.is_configured(),
            self.state(),
            self.metrics.snapshot(),
        )
    }

    /// Hand out the current connection, establishing one if allowed.
    ///
    /// Never waits longer than the configured connect attempts and their
    /// timeouts. Returns `Unavailable` without touching the store while the
    /// connection is cooling down or another connect is in flight.
    pub async fn acquire(&self) -> std::result::Result<Lease, Unavailable> {
        let Some(connector) = self.connector.clone() else {
            return Err(Unavailable::NotConfigured);
        };

        match self.begin() {
            Ok(Begin::Ready(lease)) => Ok(lease),
            Ok(Begin::Connect) => self.connect(connector).await,
            Err((unavailable, stale)) => {
                if let Some(handle) = stale {
                    handle.close().await;
                }
                Err(unavailable)
            }
        }
    }

    fn begin(&self) -> std::result::Result<Begin, Refusal> {
        let mut slot = lock(&self.slot);
        let state = slot.state;
        match state {
            ConnectionState::Connected => {
                if let Some(handle) = slot.handle.as_ref().filter(|h| h.is_healthy()) {
                    return Ok(Begin::Ready(Lease {
                        handle: handle.clone(),
                        generation: slot.generation,
                    }));
                }
                let stale = slot.enter_cooldown(&self.metrics);
                self.metrics.record_short_circuit();
                warn!(connection = %self.name, "Store handle reported unhealthy, entering cooldown");
                return Err((
                    Unavailable::CoolingDown {
                        remaining: self.config.cooldown,
                    },
                    stale,
                ));
            }
            ConnectionState::Cooldown => {
                let elapsed = slot
                    .cooldown_started_at
                    .map(|started| started.elapsed())
                    .unwrap_or(self.config.cooldown);
                if elapsed < self.config.cooldown {
                    self.metrics.record_short_circuit();
                    return Err((
                        Unavailable::CoolingDown {
                            remaining: self.config.cooldown - elapsed,
                        },
                        None,
                    ));
                }
            }
            ConnectionState::Connecting => {
                self.metrics.record_short_circuit();
                return Err((Unavailable::ConnectInFlight, None));
            }
            ConnectionState::Disconnected => {}
        }

        slot.state = ConnectionState::Connecting;
        Ok(Begin::Connect)
    }

    async fn connect(
        &self,
        connector: Arc<dyn StoreConnector>,
    ) -> std::result::Result<Lease, Unavailable> {
        let mut guard = ConnectingGuard {
            slot: &self.slot,
            armed: true,
        };

        let policy = RetryPolicy::exponential(
            self.config.connect_attempts,
            self.config.connect_retry_base,
            self.config.connect_retry_cap,
        );
        let attempts = policy.attempts();
        let connect_timeout = self.config.connect_timeout;
        let target = connector.describe();

        debug!(connection = %self.name, target = %target, "Connecting to store");

        let result = retry(&policy, |attempt| {
            let connector = connector.clone();
            let metrics = self.metrics.clone();
            let name = self.name.clone();
            async move {
                metrics.record_connect_attempt();
                debug!(connection = %name, attempt, "Store connect attempt");
                match tokio::time::timeout(connect_timeout, connector.connect()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::StoreTimeout {
                        millis: connect_timeout.as_millis() as u64,
                    }),
                }
            }
        })
        .await;

        guard.armed = false;
        let mut slot = lock(&self.slot);
        match result {
            Ok(handle) => {
                slot.generation += 1;
                slot.state = ConnectionState::Connected;
                slot.handle = Some(handle.clone());
                slot.cooldown_started_at = None;
                self.metrics.record_connect();
                info!(connection = %self.name, target = %target, "Store connected");
                Ok(Lease {
                    handle,
                    generation: slot.generation,
                })
            }
            Err(e) => {
                self.metrics.record_connect_failure();
                slot.enter_cooldown(&self.metrics);
                warn!(
                    connection = %self.name,
                    target = %target,
                    attempts,
                    cooldown_ms = self.config.cooldown.as_millis() as u64,
                    error = %e,
                    "Store connect failed, entering cooldown"
                );
                Err(Unavailable::ConnectFailed {
                    attempts,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Report a command failure on an established connection.
    ///
    /// The connection enters cooldown immediately. Reports against a lease
    /// from an older connection are ignored.
    pub async fn report_failure(&self, lease: &Lease, error: &Error) {
        self.metrics.record_op_failure();
        let stale = {
            let mut slot = lock(&self.slot);
            if slot.generation != lease.generation || slot.state != ConnectionState::Connected {
                debug!(connection = %self.name, "Ignoring failure report for replaced connection");
                return;
            }
            slot.enter_cooldown(&self.metrics)
        };
        warn!(connection = %self.name, error = %error, "Store command failed, entering cooldown");
        if let Some(handle) = stale {
            handle.close().await;
        }
    }

    /// Force the connection closed so the next acquire starts from
    /// `Disconnected` instead of reusing a suspect handle.
    pub async fn invalidate(&self, lease: &Lease) {
        let stale = {
            let mut slot = lock(&self.slot);
            if slot.generation != lease.generation || slot.state != ConnectionState::Connected {
                return;
            }
            slot.state = ConnectionState::Disconnected;
            slot.handle.take()
        };
        self.metrics.record_invalidation();
        debug!(connection = %self.name, "Store handle force-closed");
        if let Some(handle) = stale {
            handle.close().await;
        }
    }
}

/// A refused acquire, plus any handle that must be closed outside the lock.
type Refusal = (Unavailable, Option<Arc<dyn StoreHandle>>);

enum Begin {
    Ready(Lease),
    Connect,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.name)
            .field("configured", &self.is_configured())
            .field("state", &self.state())
            .finish()
    }
}

/// Identifies one of the two managed connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionId {
    Cache,
    Tracking,
}

/// The two independent connections a process owns.
///
/// Each has its own connector, state and metrics; a failure on one never
/// changes the other.
#[derive(Debug, Clone)]
pub struct Connections {
    cache: Arc<ConnectionManager>,
    tracking: Arc<ConnectionManager>,
}

impl Connections {
    pub fn new(cache: Arc<ConnectionManager>, tracking: Arc<ConnectionManager>) -> Self {
        Self { cache, tracking }
    }

    /// Both connections disabled: caching and tracking are skipped.
    pub fn disabled() -> Self {
        Self::new(
            Arc::new(ConnectionManager::disabled(CACHE_CONNECTION)),
            Arc::new(ConnectionManager::disabled(TRACKING_CONNECTION)),
        )
    }

    /// Build both connections from a store URL.
    ///
    /// `None` disables both. `memory://` uses an in-process store shared by
    /// the two connections; `redis://`, `rediss://` and `redis+unix://` open
    /// two separate Redis clients.
    pub fn from_url(url: Option<&str>, config: &StoreConfig) -> Result<Self> {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(Self::disabled());
        };

        let scheme = url.split("://").next().unwrap_or_default();
        let (cache, tracking): (Arc<dyn StoreConnector>, Arc<dyn StoreConnector>) = match scheme {
            "memory" => {
                let store = MemoryStore::new();
                (store.connector(), store.connector())
            }
            "redis" | "rediss" | "redis+unix" => (
                Arc::new(RedisConnector::open(url, config.op_timeout)?) as Arc<dyn StoreConnector>,
                Arc::new(RedisConnector::open(url, config.op_timeout)?) as Arc<dyn StoreConnector>,
            ),
            other => {
                return Err(Error::Config(format!(
                    "Unsupported store URL scheme: {}",
                    other
                )));
            }
        };

        Ok(Self::new(
            Arc::new(ConnectionManager::new(CACHE_CONNECTION, cache, config.clone())),
            Arc::new(ConnectionManager::new(
                TRACKING_CONNECTION,
                tracking,
                config.clone(),
            )),
        ))
    }

    pub fn get(&self, id: ConnectionId) -> &Arc<ConnectionManager> {
        match id {
            ConnectionId::Cache => &self.cache,
            ConnectionId::Tracking => &self.tracking,
        }
    }

    /// Acquire one of the managed connections.
    pub async fn acquire(&self, id: ConnectionId) -> std::result::Result<Lease, Unavailable> {
        self.get(id).acquire().await
    }

    pub fn cache(&self) -> &Arc<ConnectionManager> {
        &self.cache
    }

    pub fn tracking(&self) -> &Arc<ConnectionManager> {
        &self.tracking
    }
}
