//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::broadcast::job_store::{Job, JobStatus};
use crate::screening::ScreeningStatus;

/// Progress event for a job: a snapshot of the job after one update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressEvent {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub timestamp: DateTime<Utc>,
    /// Input position of the entity that was just screened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// Classification of that entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_status: Option<ScreeningStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            filename: job.filename.clone(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            timestamp: Utc::now(),
            row: None,
            entity_status: None,
            output_path: job.output_path.clone(),
            error: job.error.clone(),
        }
    }

    /// Event for one screened entity.
    pub fn screened(job: &Job, row: usize, status: ScreeningStatus) -> Self {
        Self {
            row: Some(row),
            entity_status: Some(status),
            ..Self::from_job(job)
        }
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
