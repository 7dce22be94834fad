//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auction, health, profile, visitors};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}

/// Router with the request-id, tracing, compression and CORS layers applied.
pub fn build_app(state: Arc<AppState>) -> Router {
    create_router(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id))
        .layer(cors_layer())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", post(profile::resolve_profile))
        .route("/auction", post(auction::resolve_auction))
        .route("/visits", post(visitors::record_visit))
        .route("/stats/visitors", get(visitors::unique_visitors))
}
