//! Health check handlers.

use axum::{Json, extract::State};
use persona_store::HealthCheck;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub name: String,
    pub status: &'static str,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub connect_attempts: u64,
    pub cooldowns: u64,
    pub op_failures: u64,
}

impl From<HealthCheck> for ConnectionReport {
    fn from(check: HealthCheck) -> Self {
        Self {
            status: check.status.label(),
            reason: check.status.reason().map(str::to_string),
            state: check.state.as_str(),
            name: check.connection,
            connect_attempts: check.connect_attempts,
            cooldowns: check.cooldowns,
            op_failures: check.op_failures,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub ready: bool,
    pub providers: bool,
    pub connections: Vec<ConnectionReport>,
}

/// Always ready: a degraded store only turns results into fallbacks.
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        providers: state.pipeline.chain().has_providers(),
        connections: state
            .pipeline
            .store_health()
            .into_iter()
            .map(ConnectionReport::from)
            .collect(),
    })
}
