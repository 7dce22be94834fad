//! Command handlers.

use anyhow::Context;
use persona_api::AppState;
use persona_api::handlers::auction::AuctionResponse;
use persona_core::{AuctionRequest, FingerprintRecord};
use persona_pipeline::{PipelineConfig, PipelineContext};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

type CliResult = anyhow::Result<()>;

/// Run the HTTP server until Ctrl-C.
pub async fn serve(mut config: PipelineConfig, bind: Option<String>) -> CliResult {
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    let context = Arc::new(PipelineContext::from_config(config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = context.spawn_sweeper(shutdown_rx);

    let state = Arc::new(AppState::new(Arc::clone(&context)));
    persona_api::serve(listener, state, shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Profile a fingerprint read from a file and print the response.
pub async fn profile(config: PipelineConfig, file: &Path) -> CliResult {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let record: FingerprintRecord =
        serde_json::from_str(&raw).context("Fingerprint file is not a valid record")?;

    let context = PipelineContext::from_config(config)?;
    let resolved = context.resolve_profile(record).await?;

    print_json(&json!({
        "profile": resolved.result,
        "source": resolved.source,
    }))
}

/// Simulate an auction and print the response.
pub async fn auction(
    config: PipelineConfig,
    summary: String,
    country: String,
    country_code: String,
) -> CliResult {
    let context = PipelineContext::from_config(config)?;
    let request = AuctionRequest {
        profile_summary: summary,
        country,
        country_code,
    };
    let resolved = context.resolve_auction(request, None).await?;

    print_json(&AuctionResponse::from(resolved))
}

pub async fn record_visit(config: PipelineConfig, visitor_id: &str) -> CliResult {
    let context = PipelineContext::from_config(config)?;
    warn_if_untracked(&context);
    let is_new = context.record_visit(visitor_id).await;
    print_json(&json!({ "isNew": is_new }))
}

pub async fn count_visitors(config: PipelineConfig) -> CliResult {
    let context = PipelineContext::from_config(config)?;
    warn_if_untracked(&context);
    println!("{}", context.unique_visitors().await);
    Ok(())
}

fn warn_if_untracked(context: &PipelineContext) {
    if !context.connections().tracking().is_configured() {
        warn!("PERSONA_STORE_URL is not set, visitors are not tracked");
    }
}

/// Print the effective configuration with credentials masked.
pub fn show_config(config: &PipelineConfig) -> CliResult {
    print_json(&config.masked())
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
