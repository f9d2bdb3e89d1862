//! Application state for the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::db::repository::FullRepository;
use crate::services::job_tracker::JobTracker;
use crate::services::{PredictionEngine, SyncService};
use crate::upstream::PriceSource;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for storage operations
    pub repository: Arc<dyn FullRepository>,
    /// Upstream price source (search, live prices, sync ingestion)
    pub source: Arc<dyn PriceSource>,
    /// Prediction engine with the per-game single-flight cache policy
    pub engine: Arc<PredictionEngine>,
    /// Background sync orchestrator
    pub sync: Arc<SyncService>,
    /// Tracker behind the job status and SSE log endpoints
    pub jobs: JobTracker,
    /// Runtime settings (reported by /health)
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the application state from its storage backend, upstream source
    /// and settings.
    pub fn new(
        repository: Arc<dyn FullRepository>,
        source: Arc<dyn PriceSource>,
        settings: Settings,
    ) -> Self {
        let jobs = JobTracker::new();
        let sync = Arc::new(SyncService::new(
            Arc::clone(&repository),
            Arc::clone(&source),
            jobs.clone(),
            settings.itad_history_since,
            settings.sync_batch_size,
            Duration::from_millis(settings.sync_batch_delay_ms),
        ));
        Self {
            repository,
            source,
            engine: Arc::new(PredictionEngine::new()),
            sync,
            jobs,
            settings: Arc::new(settings),
        }
    }
}
