//! Shared harness for the scenario, API and Redis test suites.
//!
//! [`TestContext`] builds a real [`persona_pipeline::PipelineContext`] over
//! an in-memory store and two wiremock chat-completions servers. Tests
//! script provider replies and store faults, then assert on the provenance
//! of what comes back:
//!
//! ```ignore
//! let ctx = TestContext::new().await?;
//! ctx.primary_fails(503).await;
//! ctx.secondary_returns(&profile_completion()).await;
//! ctx.store.set_down(true);
//!
//! let resolved = ctx
//!     .pipeline
//!     .resolve_profile(FingerprintFixture::developer("fp-1"))
//!     .await?;
//! assert_eq!(resolved.tier, Some(ProviderTier::Secondary));
//! ```
//!
//! Tests against a real Redis container are behind the `integration` feature.

pub mod containers;
pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Route pipeline logs to the test writer. Safe to call from every test.
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,persona_pipeline=debug,persona_store=debug")),
        )
        .with_test_writer()
        .try_init();
}
