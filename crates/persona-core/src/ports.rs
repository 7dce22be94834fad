//! Port traits (hexagonal architecture).
//!
//! These traits define the interface between the pipeline and the external
//! key-value store. Adapters live in `persona-store`.

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Establishes connections to a key-value store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connection target with credentials stripped, for logs.
    fn describe(&self) -> String;

    /// Open a new connection.
    async fn connect(&self) -> Result<Arc<dyn StoreHandle>>;
}

/// An established store connection.
#[async_trait]
pub trait StoreHandle: Send + Sync {
    /// Whether the handle still believes its connection is usable.
    fn is_healthy(&self) -> bool;

    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Add a member to a set. Returns `true` if the member was not present.
    async fn set_add(&self, set: &str, member: &str) -> Result<bool>;

    /// Number of members in a set.
    async fn set_len(&self, set: &str) -> Result<u64>;

    /// Release the connection. Further calls may fail.
    async fn close(&self) {}
}
