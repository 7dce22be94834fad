//! Visitor profile handler.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use persona_core::{FingerprintRecord, ProfileResult, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use super::rejection_message;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: Option<ProfileResult>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProfileResponse {
    fn rejected(message: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                profile: None,
                source: Source::Fallback,
                error: Some(message),
            }),
        )
    }
}

pub async fn resolve_profile(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FingerprintRecord>, JsonRejection>,
) -> (StatusCode, Json<ProfileResponse>) {
    let record = match body {
        Ok(Json(record)) => record,
        Err(rejection) => return ProfileResponse::rejected(rejection_message(&rejection)),
    };

    match state.pipeline.resolve_profile(record).await {
        Ok(resolved) => {
            debug!(source = %resolved.source, "Profile resolved");
            (
                StatusCode::OK,
                Json(ProfileResponse {
                    profile: Some(resolved.result),
                    source: resolved.source,
                    error: None,
                }),
            )
        }
        Err(e) if e.is_caller_error() => ProfileResponse::rejected(e.to_string()),
        Err(e) => {
            error!(error = %e, "Profile resolution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProfileResponse {
                    profile: None,
                    source: Source::Fallback,
                    error: Some("Internal error".to_string()),
                }),
            )
        }
    }
}
