//! Application state shared across all request handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ranking::RankingPipeline;

/// Shared application state.
pub struct AppState {
    /// Ranking pipeline serving search requests.
    pub pipeline: RankingPipeline,
    /// Fired on shutdown; in-flight rankings observe it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(pipeline: RankingPipeline, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self { pipeline, shutdown })
    }
}
