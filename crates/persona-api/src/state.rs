//! Application state shared across handlers.

use persona_pipeline::PipelineContext;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineContext>,
}

impl AppState {
    pub fn new(pipeline: Arc<PipelineContext>) -> Self {
        Self { pipeline }
    }
}
