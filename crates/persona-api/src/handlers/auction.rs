//! Ad auction handler.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use persona_core::{AuctionRequest, BidRecord, FactorRecord, ProviderTier, Source};
use persona_pipeline::Resolved;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::rejection_message;
use crate::state::AppState;

pub const VISITOR_ID_HEADER: &str = "x-visitor-id";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResponse {
    pub bids: Vec<BidRecord>,
    pub value_factors: Vec<FactorRecord>,
    pub source: String,
}

impl From<Resolved<persona_core::AuctionResult>> for AuctionResponse {
    fn from(resolved: Resolved<persona_core::AuctionResult>) -> Self {
        Self {
            source: auction_source(resolved.source, resolved.tier).to_string(),
            bids: resolved.result.bids,
            value_factors: resolved.result.value_factors,
        }
    }
}

/// Wire provenance for an auction. The secondary provider is reported under
/// its own tag.
pub fn auction_source(source: Source, tier: Option<ProviderTier>) -> &'static str {
    match (source, tier) {
        (Source::Ai, Some(ProviderTier::Secondary)) => "mimo-equivalent",
        (source, _) => source.as_str(),
    }
}

pub async fn resolve_auction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<AuctionRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(rejection_message(&rejection)),
    };

    let visitor = headers
        .get(VISITOR_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.pipeline.resolve_auction(request, visitor).await {
        Ok(resolved) => Json(AuctionResponse::from(resolved)).into_response(),
        Err(e) if e.is_caller_error() => bad_request(e.to_string()),
        Err(e) => {
            error!(error = %e, "Auction resolution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal error" })),
            )
                .into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
