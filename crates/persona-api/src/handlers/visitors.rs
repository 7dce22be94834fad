//! Visitor tracking handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::rejection_message;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    pub visitor_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitResponse {
    pub is_new: bool,
}

pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<VisitRequest>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(visit)) => {
            let is_new = state.pipeline.record_visit(&visit.visitor_id).await;
            Json(VisitResponse { is_new }).into_response()
        }
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": rejection_message(&rejection) })),
        )
            .into_response(),
    }
}

/// Total unique visitors as a bare integer.
pub async fn unique_visitors(State(state): State<Arc<AppState>>) -> String {
    state.pipeline.unique_visitors().await.to_string()
}
