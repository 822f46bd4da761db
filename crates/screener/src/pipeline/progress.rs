use std::sync::Arc;

use log::debug;

use crate::broadcast::{Job, JobProgressBroadcaster, JobProgressEvent, JobStore};
use crate::error::JobError;
use crate::screening::ScreeningStatus;

/// Events emitted while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    EntityScreened { row: usize, status: ScreeningStatus },
    Completed { output_path: String },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Applies events to the job store and streams the resulting snapshot.
pub struct TrackerProgress {
    job_id: String,
    store: Arc<JobStore>,
    broadcaster: Option<JobProgressBroadcaster>,
}

impl TrackerProgress {
    pub fn new(job_id: &str, store: Arc<JobStore>) -> Self {
        Self {
            job_id: job_id.to_string(),
            store,
            broadcaster: None,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    fn apply(&self, event: &ProgressEvent) -> Result<Job, JobError> {
        match event {
            ProgressEvent::Started { total } => self.store.start_processing(&self.job_id, *total),
            ProgressEvent::EntityScreened { status, .. } => {
                self.store.record_processed(&self.job_id, *status)
            }
            ProgressEvent::Completed { output_path } => {
                self.store.complete(&self.job_id, output_path)
            }
            ProgressEvent::Failed { error } => self.store.fail(&self.job_id, error),
        }
    }
}

impl ProgressReporter for TrackerProgress {
    fn report(&self, event: ProgressEvent) {
        let job = match self.apply(&event) {
            Ok(job) => job,
            Err(e) => {
                // Late events from abandoned workers land on a failed job.
                debug!("Ignoring {:?} for job {}: {}", event, self.job_id, e);
                return;
            }
        };

        if let Some(ref broadcaster) = self.broadcaster {
            let update = match event {
                ProgressEvent::EntityScreened { row, status } => {
                    JobProgressEvent::screened(&job, row, status)
                }
                _ => JobProgressEvent::from_job(&job),
            };
            broadcaster.send(update);
        }
    }
}
