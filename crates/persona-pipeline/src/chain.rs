//! The fallback chain: cache, rate gate, primary, secondary, local fallback.

use crate::fallback::{fallback_auction, fallback_profile};
use crate::normalize::{NormalizeError, normalize_auction, normalize_profile};
use crate::prompts::{auction_prompt, profile_prompt};
use crate::providers::{InferenceProvider, Prompt, excerpt};
use crate::rate_limit::RateLimiter;
use persona_cache::{CacheTtls, Lookup, ResultCache, WriteOutcome, auction_key, profile_key};
use persona_core::{
    AuctionRequest, AuctionResult, FingerprintKey, FingerprintRecord, ProfileResult, ProviderTier,
    Source,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something the chain can resolve: it knows its cache slot, its caller, how
/// to ask a provider, and how to compute a result without one.
pub trait Subject: Send + Sync {
    type Output: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Short name for logs.
    fn kind(&self) -> &'static str;

    fn cache_key(&self) -> String;

    /// Rate-limit bucket.
    fn caller_id(&self) -> String;

    fn ttl(&self, ttls: &CacheTtls) -> Duration;

    fn prompt(&self) -> Prompt;

    fn normalize(&self, text: &str) -> Result<Self::Output, NormalizeError>;

    /// Local computation. Must not fail.
    fn fallback(&self) -> Self::Output;
}

/// A fingerprint to profile.
#[derive(Debug, Clone)]
pub struct ProfileSubject {
    key: FingerprintKey,
    record: FingerprintRecord,
}

impl ProfileSubject {
    /// Validate the record's identity. Caller errors surface here.
    pub fn new(record: FingerprintRecord) -> persona_core::Result<Self> {
        let key = record.key()?;
        Ok(Self { key, record })
    }

    pub fn key(&self) -> &FingerprintKey {
        &self.key
    }
}

impl Subject for ProfileSubject {
    type Output = ProfileResult;

    fn kind(&self) -> &'static str {
        "profile"
    }

    fn cache_key(&self) -> String {
        profile_key(&self.key)
    }

    fn caller_id(&self) -> String {
        self.key.as_caller_id()
    }

    fn ttl(&self, ttls: &CacheTtls) -> Duration {
        ttls.profile
    }

    fn prompt(&self) -> Prompt {
        profile_prompt(&self.record)
    }

    fn normalize(&self, text: &str) -> Result<ProfileResult, NormalizeError> {
        normalize_profile(text)
    }

    fn fallback(&self) -> ProfileResult {
        fallback_profile(&self.record)
    }
}

/// An auction to simulate.
#[derive(Debug, Clone)]
pub struct AuctionSubject {
    request: AuctionRequest,
    caller: String,
}

impl AuctionSubject {
    /// Validate the request. Without an explicit caller the summary digest
    /// is used as the rate-limit bucket.
    pub fn new(request: AuctionRequest, caller: Option<&str>) -> persona_core::Result<Self> {
        let request = request.normalized()?;
        let caller = caller
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!("visitor:{}", c))
            .unwrap_or_else(|| {
                format!("auction:{}", persona_cache::summary_digest(&request.profile_summary))
            });
        Ok(Self { request, caller })
    }

    pub fn request(&self) -> &AuctionRequest {
        &self.request
    }
}

impl Subject for AuctionSubject {
    type Output = AuctionResult;

    fn kind(&self) -> &'static str {
        "auction"
    }

    fn cache_key(&self) -> String {
        auction_key(&self.request)
    }

    fn caller_id(&self) -> String {
        self.caller.clone()
    }

    fn ttl(&self, ttls: &CacheTtls) -> Duration {
        ttls.auction
    }

    fn prompt(&self) -> Prompt {
        auction_prompt(&self.request)
    }

    fn normalize(&self, text: &str) -> Result<AuctionResult, NormalizeError> {
        normalize_auction(text)
    }

    fn fallback(&self) -> AuctionResult {
        fallback_auction(&self.request)
    }
}

/// A resolved result and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub result: T,
    pub source: Source,
    /// Set for `Source::Ai`.
    pub tier: Option<ProviderTier>,
}

impl<T> Resolved<T> {
    fn cache(result: T) -> Self {
        Self {
            result,
            source: Source::Cache,
            tier: None,
        }
    }

    fn ai(result: T, tier: ProviderTier) -> Self {
        Self {
            result,
            source: Source::Ai,
            tier: Some(tier),
        }
    }

    fn fallback(result: T) -> Self {
        Self {
            result,
            source: Source::Fallback,
            tier: None,
        }
    }
}

/// Orders the ways of producing a result and guarantees one of them does.
#[derive(Clone)]
pub struct FallbackChain {
    cache: ResultCache,
    limiter: Arc<RateLimiter>,
    primary: Option<Arc<dyn InferenceProvider>>,
    secondary: Option<Arc<dyn InferenceProvider>>,
    ttls: CacheTtls,
}

impl FallbackChain {
    pub fn new(cache: ResultCache, limiter: Arc<RateLimiter>, ttls: CacheTtls) -> Self {
        Self {
            cache,
            limiter,
            primary: None,
            secondary: None,
            ttls,
        }
    }

    pub fn with_primary(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn has_providers(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Resolve a subject. Never fails: the last step is a local computation.
    pub async fn resolve<S: Subject>(&self, subject: &S) -> Resolved<S::Output> {
        let key = subject.cache_key();

        if let Lookup::Hit(result) = self.cache.get::<S::Output>(&key).await {
            return Resolved::cache(result);
        }

        if !self.has_providers() {
            debug!(kind = subject.kind(), "No inference provider configured, using fallback");
            return Resolved::fallback(subject.fallback());
        }

        let caller = subject.caller_id();
        if !self.limiter.allow(&caller) {
            info!(kind = subject.kind(), caller = %caller, "Rate limited, using fallback");
            return Resolved::fallback(subject.fallback());
        }

        let providers = [
            (ProviderTier::Primary, &self.primary),
            (ProviderTier::Secondary, &self.secondary),
        ];
        for (tier, provider) in providers {
            let Some(provider) = provider else {
                continue;
            };
            if let Some(result) = self.attempt(provider.as_ref(), subject).await {
                let outcome = self.cache.put(&key, &result, subject.ttl(&self.ttls)).await;
                if let WriteOutcome::Ignored { reason } = outcome {
                    debug!(key = %key, reason = %reason, "Result not cached");
                }
                info!(kind = subject.kind(), provider = provider.name(), %tier, "Resolved by provider");
                return Resolved::ai(result, tier);
            }
        }

        info!(kind = subject.kind(), "All providers failed, using fallback");
        Resolved::fallback(subject.fallback())
    }

    async fn attempt<S: Subject>(
        &self,
        provider: &dyn InferenceProvider,
        subject: &S,
    ) -> Option<S::Output> {
        let text = match provider.complete(&subject.prompt()).await {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = subject.kind(), provider = provider.name(), error = %e, "Provider call failed");
                return None;
            }
        };

        match subject.normalize(&text) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(
                    kind = subject.kind(),
                    provider = provider.name(),
                    error = %e,
                    body = %excerpt(&text),
                    "Provider response rejected"
                );
                None
            }
        }
    }
}
