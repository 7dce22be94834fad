//! HTTP API tests against a server on an ephemeral port.
//!
//! Run with: `cargo test -p persona-tests --test api_tests`

use persona_tests::{
    ApiTestClient, AuctionFixture, FingerprintFixture, TestContext, auction_completion,
    profile_completion, start_test_server,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn client_for(ctx: &TestContext) -> ApiTestClient {
    let (addr, _handle) = start_test_server(ctx.pipeline.clone())
        .await
        .expect("Failed to start server");
    ApiTestClient::new(addr)
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    let client = client_for(&ctx).await;

    let resp = client.get("/health").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    // Liveness does not depend on the store.
    ctx.store.set_down(true);
    assert!(client.health().await.expect("Health check failed"));
}

#[tokio::test]
async fn test_ready_reports_connections_even_when_store_is_down() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    ctx.store.set_down(true);
    ctx.pipeline
        .resolve_profile(FingerprintFixture::developer("ready"))
        .await
        .unwrap();

    let client = client_for(&ctx).await;
    let resp = client.get("/ready").await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ready"], true);
    assert_eq!(body["providers"], true);
    assert_eq!(body["connections"][0]["name"], "cache");
    assert_eq!(body["connections"][0]["status"], "unhealthy");
    assert_eq!(body["connections"][0]["state"], "cooldown");
    assert_eq!(body["connections"][1]["name"], "tracking");
}

#[tokio::test]
async fn test_profile_endpoint_returns_provider_result() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    ctx.primary_returns(&profile_completion()).await;
    let client = client_for(&ctx).await;

    let resp = client
        .post("/api/v1/profile", &FingerprintFixture::developer("http"))
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "ai");
    assert_eq!(body["profile"]["isDeveloper"], true);
    assert_eq!(body["profile"]["deviceTier"], "premium");
    assert!(body.get("error").is_none());

    let resp = client
        .post("/api/v1/profile", &FingerprintFixture::developer("http"))
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "cache");
}

#[tokio::test]
async fn test_profile_endpoint_rejects_missing_identity() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    let client = client_for(&ctx).await;

    let resp = client
        .post("/api/v1/profile", &json!({ "platform": "Linux x86_64" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["profile"], Value::Null);
    assert_eq!(body["source"], "fallback");
    assert!(body["error"].as_str().unwrap().contains("fingerprintId"));
}

#[tokio::test]
async fn test_profile_endpoint_rejects_malformed_json() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    let client = client_for(&ctx).await;

    let resp = client
        .post_raw("/api/v1/profile", "{ not json")
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "fallback");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_auction_endpoint_tags_secondary_results() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    ctx.primary_fails(502).await;
    ctx.secondary_returns(&auction_completion()).await;
    let client = client_for(&ctx).await;

    let resp = client
        .post_as_visitor(
            "/api/v1/auction",
            "visitor-7",
            &AuctionFixture::developer_in_germany(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "mimo-equivalent");
    assert_eq!(body["bids"].as_array().unwrap().len(), 3);
    assert_eq!(body["bids"][0]["won"], true);
    assert_eq!(body["valueFactors"][0]["impact"], "positive");
}

#[tokio::test]
async fn test_auction_endpoint_falls_back_with_populated_bids() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    ctx.primary_fails(500).await;
    ctx.secondary_fails(500).await;
    let client = client_for(&ctx).await;

    let resp = client
        .post("/api/v1/auction", &AuctionFixture::developer_in_germany())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "fallback");
    assert!(!body["bids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_auction_endpoint_rejects_bad_country_code() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    let client = client_for(&ctx).await;

    let resp = client
        .post(
            "/api/v1/auction",
            &json!({ "profileSummary": "Developer", "country": "Germany", "countryCode": "GER" }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("countryCode"));
}

#[tokio::test]
async fn test_visits_and_visitor_stats() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    let client = client_for(&ctx).await;

    for (visitor, expected) in [("a", true), ("a", false), ("b", true)] {
        let resp = client
            .post("/api/v1/visits", &json!({ "visitorId": visitor }))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["isNew"], expected, "visitor {}", visitor);
    }

    let resp = client.get("/api/v1/stats/visitors").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "2");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::new().await.expect("Failed to create context");
    let (addr, _handle) = start_test_server(ctx.pipeline.clone()).await.unwrap();

    let resp = reqwest::Client::new()
        .get(format!("http://{}/health", addr))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-123");
}
