//! Process-wide pipeline wiring.

use crate::chain::{AuctionSubject, FallbackChain, ProfileSubject, Resolved};
use crate::config::PipelineConfig;
use crate::providers::{ChatCompletionsProvider, InferenceProvider, ProviderConfig};
use crate::rate_limit::RateLimiter;
use crate::visitors::VisitorTracker;
use persona_cache::ResultCache;
use persona_core::{AuctionRequest, AuctionResult, FingerprintRecord, ProfileResult, Result};
use persona_store::{Connections, HealthCheck};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything a request handler needs. Build once, share behind an `Arc`.
pub struct PipelineContext {
    config: PipelineConfig,
    connections: Connections,
    limiter: Arc<RateLimiter>,
    chain: FallbackChain,
    visitors: VisitorTracker,
}

impl PipelineContext {
    /// Wire connections and providers from configuration.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: PipelineConfig) -> PipelineContextBuilder {
        PipelineContextBuilder {
            config,
            connections: None,
            primary: None,
            secondary: None,
        }
    }

    /// Profile a fingerprint. Only a malformed record is an error.
    pub async fn resolve_profile(
        &self,
        record: FingerprintRecord,
    ) -> Result<Resolved<ProfileResult>> {
        let subject = ProfileSubject::new(record)?;
        Ok(self.chain.resolve(&subject).await)
    }

    /// Simulate an auction. `caller` selects the rate-limit bucket.
    pub async fn resolve_auction(
        &self,
        request: AuctionRequest,
        caller: Option<&str>,
    ) -> Result<Resolved<AuctionResult>> {
        let subject = AuctionSubject::new(request, caller)?;
        Ok(self.chain.resolve(&subject).await)
    }

    pub async fn record_visit(&self, visitor_id: &str) -> bool {
        self.visitors.record_visit(visitor_id).await
    }

    pub async fn unique_visitors(&self) -> u64 {
        self.visitors.total_unique_count().await
    }

    /// Start the rate limiter's periodic sweep.
    pub fn spawn_sweeper(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.limiter
            .spawn_sweeper(self.config.rate_limit.sweep_interval, shutdown)
    }

    /// Health of both store connections, cache first.
    pub fn store_health(&self) -> [HealthCheck; 2] {
        [
            self.connections.cache().health_check(),
            self.connections.tracking().health_check(),
        ]
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn cache(&self) -> &ResultCache {
        self.chain.cache()
    }

    pub fn visitors(&self) -> &VisitorTracker {
        &self.visitors
    }
}

/// Builder for [`PipelineContext`]. Anything not supplied is built from the
/// configuration.
pub struct PipelineContextBuilder {
    config: PipelineConfig,
    connections: Option<Connections>,
    primary: Option<Arc<dyn InferenceProvider>>,
    secondary: Option<Arc<dyn InferenceProvider>>,
}

impl PipelineContextBuilder {
    pub fn with_connections(mut self, connections: Connections) -> Self {
        self.connections = Some(connections);
        self
    }

    pub fn with_primary(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn build(self) -> Result<PipelineContext> {
        let config = self.config;

        let connections = match self.connections {
            Some(connections) => connections,
            None => Connections::from_url(config.store_url.as_deref(), &config.store)?,
        };

        let primary = match self.primary {
            Some(provider) => Some(provider),
            None => configured_provider("primary", &config, &config.primary)?,
        };
        let secondary = match self.secondary {
            Some(provider) => Some(provider),
            None => configured_provider("secondary", &config, &config.secondary)?,
        };

        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let cache = ResultCache::new(Arc::clone(connections.cache()));

        let mut chain = FallbackChain::new(cache, Arc::clone(&limiter), config.ttls);
        if let Some(provider) = primary {
            chain = chain.with_primary(provider);
        }
        if let Some(provider) = secondary {
            chain = chain.with_secondary(provider);
        }

        let visitors = VisitorTracker::new(Arc::clone(connections.tracking()));

        info!(
            store = connections.cache().is_configured(),
            primary = config.primary.is_enabled(),
            secondary = config.secondary.is_enabled(),
            "Pipeline context ready"
        );

        Ok(PipelineContext {
            config,
            connections,
            limiter,
            chain,
            visitors,
        })
    }
}

fn configured_provider(
    name: &str,
    config: &PipelineConfig,
    settings: &crate::config::ProviderSettings,
) -> Result<Option<Arc<dyn InferenceProvider>>> {
    match ProviderConfig::from_settings(name, settings, config.provider_timeout) {
        Some(provider) => {
            let provider: Arc<dyn InferenceProvider> =
                Arc::new(ChatCompletionsProvider::new(provider)?);
            Ok(Some(provider))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::{Error, Source};
    use std::collections::HashMap;

    fn memory_config() -> PipelineConfig {
        let mut vars = HashMap::new();
        vars.insert("PERSONA_STORE_URL".to_string(), "memory://".to_string());
        PipelineConfig::from_map(vars).unwrap()
    }

    fn record() -> FingerprintRecord {
        FingerprintRecord {
            fingerprint_id: "fp-1".to_string(),
            hardware_id: "hw-1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_default_context_uses_fallback() {
        let ctx = PipelineContext::from_config(PipelineConfig::default()).unwrap();
        assert!(!ctx.chain().has_providers());
        assert!(!ctx.connections().cache().is_configured());

        let resolved = ctx.resolve_profile(record()).await.unwrap();
        assert_eq!(resolved.source, Source::Fallback);
    }

    #[tokio::test]
    async fn test_invalid_record_is_caller_error() {
        let ctx = PipelineContext::from_config(PipelineConfig::default()).unwrap();
        let err = ctx
            .resolve_profile(FingerprintRecord::default())
            .await
            .unwrap_err();
        assert!(err.is_caller_error());
    }

    #[tokio::test]
    async fn test_invalid_auction_is_caller_error() {
        let ctx = PipelineContext::from_config(PipelineConfig::default()).unwrap();
        let err = ctx
            .resolve_auction(
                AuctionRequest {
                    profile_summary: "  ".to_string(),
                    country: "Germany".to_string(),
                    country_code: "DE".to_string(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_memory_store_tracks_visitors() {
        let ctx = PipelineContext::from_config(memory_config()).unwrap();
        assert!(ctx.record_visit("v-1").await);
        assert!(!ctx.record_visit("v-1").await);
        assert_eq!(ctx.unique_visitors().await, 1);
    }

    #[tokio::test]
    async fn test_configured_keys_enable_providers() {
        let mut config = PipelineConfig::default();
        config.primary.api_key = Some("sk-test".to_string());
        let ctx = PipelineContext::from_config(config).unwrap();
        assert!(ctx.chain().has_providers());
    }

    #[tokio::test]
    async fn test_store_health_reports_both_connections() {
        let ctx = PipelineContext::from_config(PipelineConfig::default()).unwrap();
        let [cache, tracking] = ctx.store_health();
        assert_eq!(cache.connection, "cache");
        assert_eq!(tracking.connection, "tracking");
    }
}
