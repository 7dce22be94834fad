//! Persona Pipeline
//!
//! Turns a fingerprint or an auction request into a result that is always
//! usable: cached, inferred by a remote provider, or computed locally.
//!
//! - [`FallbackChain`]: cache, rate gate, primary, secondary, deterministic fallback
//! - [`RateLimiter`]: fixed-window budget for remote inference per caller
//! - [`VisitorTracker`]: unique-visitor set with bounded retries
//! - [`PipelineContext`]: everything above, built once per process

pub mod chain;
pub mod config;
pub mod context;
pub mod fallback;
pub mod normalize;
pub mod prompts;
pub mod providers;
pub mod rate_limit;
pub mod visitors;

pub use chain::{AuctionSubject, FallbackChain, ProfileSubject, Resolved, Subject};
pub use config::{PipelineConfig, ProviderSettings, RateLimitConfig, Settings};
pub use context::{PipelineContext, PipelineContextBuilder};
pub use normalize::NormalizeError;
pub use providers::{ChatCompletionsProvider, InferenceProvider, Prompt, ProviderConfig, ProviderError};
pub use rate_limit::RateLimiter;
pub use visitors::VisitorTracker;
