//! Test context wiring a real pipeline to scripted dependencies.

use crate::fixtures::chat_completion;
use persona_pipeline::{PipelineConfig, PipelineContext};
use persona_store::{
    CACHE_CONNECTION, ConnectionManager, Connections, MemoryStore, StoreConfig,
    TRACKING_CONNECTION,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PRIMARY_KEY: &str = "sk-primary-test";
pub const SECONDARY_KEY: &str = "sk-secondary-test";

/// Store timings short enough for tests that wait out a cooldown.
pub fn fast_store_config() -> StoreConfig {
    StoreConfig::default()
        .with_connect_attempts(2)
        .with_connect_retry(Duration::from_millis(5), Duration::from_millis(20))
        .with_connect_timeout(Duration::from_millis(250))
        .with_op_timeout(Duration::from_millis(250))
        .with_cooldown(Duration::from_millis(500))
}

/// A pipeline backed by an in-memory store and two wiremock providers.
///
/// Drop this to stop the mock servers.
pub struct TestContext {
    pub store: MemoryStore,
    pub primary: MockServer,
    pub secondary: MockServer,
    pub pipeline: Arc<PipelineContext>,
}

impl TestContext {
    /// Both providers configured, store up, default rate limit.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestContext::new`], with a hook to adjust the configuration
    /// before the pipeline is built.
    pub async fn with_config<F>(adjust: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&mut PipelineConfig),
    {
        crate::init_test_logging();

        let (primary, secondary) = tokio::join!(MockServer::start(), MockServer::start());
        let store = MemoryStore::new();

        let mut config = PipelineConfig::default();
        config.primary.api_key = Some(PRIMARY_KEY.to_string());
        config.primary.base_url = primary.uri();
        config.secondary.api_key = Some(SECONDARY_KEY.to_string());
        config.secondary.base_url = secondary.uri();
        config.provider_timeout = Duration::from_secs(2);
        config.store = fast_store_config();
        adjust(&mut config);

        let connections = memory_connections(&store, &config.store);
        let pipeline = PipelineContext::builder(config)
            .with_connections(connections)
            .build()?;

        Ok(Self {
            store,
            primary,
            secondary,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Make the primary provider answer every request with `content`.
    pub async fn primary_returns(&self, content: &Value) {
        mount_completion(&self.primary, content).await;
    }

    pub async fn secondary_returns(&self, content: &Value) {
        mount_completion(&self.secondary, content).await;
    }

    /// Make the primary provider fail every request with `status`.
    pub async fn primary_fails(&self, status: u16) {
        mount_failure(&self.primary, status).await;
    }

    /// Make the primary provider answer correctly, but only after `delay`.
    pub async fn primary_stalls(&self, content: &Value, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_completion(&content.to_string()))
                    .set_delay(delay),
            )
            .mount(&self.primary)
            .await;
    }

    pub async fn secondary_fails(&self, status: u16) {
        mount_failure(&self.secondary, status).await;
    }

    /// Requests the primary provider has received so far.
    pub async fn primary_calls(&self) -> usize {
        received(&self.primary).await
    }

    pub async fn secondary_calls(&self) -> usize {
        received(&self.secondary).await
    }
}

/// Cache and tracking connections sharing one in-memory store.
pub fn memory_connections(store: &MemoryStore, config: &StoreConfig) -> Connections {
    Connections::new(
        Arc::new(ConnectionManager::new(
            CACHE_CONNECTION,
            store.connector(),
            config.clone(),
        )),
        Arc::new(ConnectionManager::new(
            TRACKING_CONNECTION,
            store.connector(),
            config.clone(),
        )),
    )
}

/// Respond to chat completions with `content` serialized as the message.
pub async fn mount_completion(server: &MockServer, content: &Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(&content.to_string())))
        .mount(server)
        .await;
}

pub async fn mount_failure(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_string("provider unavailable"))
        .mount(server)
        .await;
}

async fn received(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
