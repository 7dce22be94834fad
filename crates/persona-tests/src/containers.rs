//! Testcontainer configurations for integration tests.

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::{REDIS_PORT, Redis};

/// Redis container for store tests.
pub struct RedisContainer {
    container: ContainerAsync<Redis>,
    url: String,
}

impl RedisContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Redis::default().with_tag("7-alpine").start().await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(REDIS_PORT).await?;

        let url = format!("redis://{}:{}", host, port);

        Ok(Self { container, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the container while keeping the handle alive.
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.container.stop().await?;
        Ok(())
    }
}
