//! Key-value store connections for Persona.
//!
//! Each [`ConnectionManager`] owns one logical connection and walks it through
//! a `Disconnected -> Connecting -> Connected -> Cooldown` state machine so a
//! degraded store is never hammered with reconnects. [`Connections`] holds the
//! two independent managers a process needs: one for result caching and one
//! for visitor tracking.

pub mod config;
pub mod health;
mod manager;
pub mod memory;
pub mod metrics;
pub mod redis;

pub use config::StoreConfig;
pub use health::{HealthCheck, HealthStatus};
pub use manager::{
    CACHE_CONNECTION, ConnectionId, ConnectionManager, ConnectionState, Connections, Lease,
    TRACKING_CONNECTION, Unavailable,
};
pub use memory::MemoryStore;
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use self::redis::RedisConnector;
