//! Redis adapter.

use async_trait::async_trait;
use persona_core::{Error, Result, StoreConnector, StoreHandle};
use ::redis::AsyncCommands;
use ::redis::aio::MultiplexedConnection;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Opens multiplexed connections to one Redis server.
pub struct RedisConnector {
    client: ::redis::Client,
    target: String,
    op_timeout: Duration,
}

impl RedisConnector {
    /// Validate the URL and prepare a client. Does not connect.
    pub fn open(url: &str, op_timeout: Duration) -> Result<Self> {
        let client = ::redis::Client::open(url)
            .map_err(|e| Error::Config(format!("Invalid store URL: {}", e)))?;
        Ok(Self {
            client,
            target: redact(url),
            op_timeout,
        })
    }
}

/// Strip the password from a connection URL.
pub fn redact(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    fn describe(&self) -> String {
        self.target.clone()
    }

    async fn connect(&self) -> Result<Arc<dyn StoreHandle>> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        debug!(target_url = %self.target, "Redis connection established");
        Ok(Arc::new(RedisHandle {
            conn,
            healthy: AtomicBool::new(true),
            op_timeout: self.op_timeout,
        }))
    }
}

struct RedisHandle {
    conn: MultiplexedConnection,
    healthy: AtomicBool,
    op_timeout: Duration,
}

impl RedisHandle {
    /// Run one command under the op timeout. Transport failures mark the
    /// handle unhealthy.
    async fn run<T, F>(&self, command: F) -> Result<T>
    where
        F: Future<Output = ::redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
                {
                    self.healthy.store(false, Ordering::Relaxed);
                }
                Err(Error::Store(e.to_string()))
            }
            Err(_) => {
                self.healthy.store(false, Ordering::Relaxed);
                Err(Error::StoreTimeout {
                    millis: self.op_timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl StoreHandle for RedisHandle {
    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        self.run(async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = self
            .run(async move { conn.sadd::<_, _, i64>(set, member).await })
            .await?;
        Ok(added > 0)
    }

    async fn set_len(&self, set: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run(async move { conn.scard::<_, u64>(set).await })
            .await
    }

    async fn close(&self) {
        // Multiplexed connections close when the last clone is dropped.
        self.healthy.store(false, Ordering::Relaxed);
    }
}
