//! HTTP API server for Persona.
//!
//! Thin transport over [`persona_pipeline::PipelineContext`]: handlers decode
//! requests, call the pipeline and map its outcome onto the wire format.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{build_app, create_router};
pub use state::AppState;

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Persona API listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
