//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use screener::broadcast::{JobProgressBroadcaster, JobStore};
use screener::config::ScreenerConfig;
use screener::pipeline::JobRunner;
use screener::search::{Pause, SearchProvider};

use crate::session::FilterStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: ScreenerConfig,
    /// Job store shared with every job runner.
    pub jobs: Arc<JobStore>,
    /// Job progress broadcaster feeding `/api/events`.
    pub broadcaster: JobProgressBroadcaster,
    pub filters: FilterStore,
    /// Runs one screening job per `/api/process` call.
    pub runner: JobRunner,
}

impl AppState {
    pub fn new(config: ScreenerConfig, provider: Arc<dyn SearchProvider>) -> Self {
        let jobs = Arc::new(JobStore::new());
        let broadcaster = JobProgressBroadcaster::default();
        let runner = JobRunner::from_config(&config, Arc::clone(&jobs), provider)
            .with_broadcaster(broadcaster.clone());

        Self {
            config,
            jobs,
            broadcaster,
            filters: FilterStore::new(),
            runner,
        }
    }

    /// Replaces the sleep used by job runners between queries.
    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.runner = self.runner.with_pause(pause);
        self
    }

    /// Creates the upload and output directories.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config.upload_directory)?;
        std::fs::create_dir_all(&self.config.output_directory)?;
        Ok(())
    }

    /// Filters for a new job: the caller's explicit list, then the session
    /// override, then the configured default.
    pub fn resolve_filters(&self, requested: Option<Vec<String>>, session_id: &str) -> Vec<String> {
        let requested = requested
            .map(screener::config::normalize_filters)
            .filter(|filters| !filters.is_empty());

        requested
            .or_else(|| self.filters.get(session_id).filter(|f| !f.is_empty()))
            .unwrap_or_else(|| self.config.filters.clone())
    }
}
