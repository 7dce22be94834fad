//! Store tests against a real Redis server.
//!
//! Run with: `cargo test -p persona-tests --test redis_tests --features integration`

#![cfg(feature = "integration")]

use persona_core::Source;
use persona_pipeline::{PipelineConfig, PipelineContext};
use persona_store::ConnectionState;
use persona_tests::{FingerprintFixture, containers::RedisContainer, context::fast_store_config};

fn config_for(url: &str) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.store_url = Some(url.to_string());
    config.store = fast_store_config();
    config
}

#[tokio::test]
async fn test_visitor_set_on_redis() {
    persona_tests::init_test_logging();
    let redis = RedisContainer::start().await.expect("Failed to start redis");
    let pipeline = PipelineContext::from_config(config_for(redis.url())).unwrap();

    assert!(pipeline.record_visit("visitor-1").await);
    assert!(!pipeline.record_visit("visitor-1").await);
    assert!(pipeline.record_visit("visitor-2").await);
    assert_eq!(pipeline.unique_visitors().await, 2);
    assert_eq!(
        pipeline.connections().tracking().state(),
        ConnectionState::Connected
    );
}

#[tokio::test]
async fn test_fallback_results_are_not_cached_on_redis() {
    persona_tests::init_test_logging();
    let redis = RedisContainer::start().await.expect("Failed to start redis");
    let pipeline = PipelineContext::from_config(config_for(redis.url())).unwrap();

    let record = FingerprintFixture::developer("redis");
    let first = pipeline.resolve_profile(record.clone()).await.unwrap();
    let second = pipeline.resolve_profile(record).await.unwrap();
    assert_eq!(first.source, Source::Fallback);
    assert_eq!(second.source, Source::Fallback);
    assert_eq!(
        pipeline.connections().cache().state(),
        ConnectionState::Connected
    );
}

#[tokio::test]
async fn test_stopped_redis_degrades_to_cooldown() {
    persona_tests::init_test_logging();
    let redis = RedisContainer::start().await.expect("Failed to start redis");
    let pipeline = PipelineContext::from_config(config_for(redis.url())).unwrap();
    assert!(pipeline.record_visit("before-stop").await);

    redis.stop().await.expect("Failed to stop redis");

    assert!(!pipeline.record_visit("after-stop").await);
    assert_eq!(pipeline.unique_visitors().await, 0);

    let resolved = pipeline
        .resolve_profile(FingerprintFixture::developer("stopped"))
        .await
        .unwrap();
    assert_eq!(resolved.source, Source::Fallback);
    assert_eq!(
        pipeline.connections().cache().state(),
        ConnectionState::Cooldown
    );
}
