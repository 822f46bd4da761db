//! In-memory job registry.
//!
//! The store is the single owner of job state. Every mutation takes the
//! write lock once, so counter increments from concurrent workers are never
//! lost and readers always see a consistent snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::screening::ScreeningStatus;

/// Lifecycle state of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn can_become(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-status tally of screened rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub adverse: usize,
    pub no_adverse: usize,
    pub empty_name: usize,
    pub blocked: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ScreeningStatus) {
        match status {
            ScreeningStatus::Adverse => self.adverse += 1,
            ScreeningStatus::NoAdverse => self.no_adverse += 1,
            ScreeningStatus::EmptyName => self.empty_name += 1,
            ScreeningStatus::Blocked => self.blocked += 1,
        }
    }

    pub fn get(&self, status: ScreeningStatus) -> usize {
        match status {
            ScreeningStatus::Adverse => self.adverse,
            ScreeningStatus::NoAdverse => self.no_adverse,
            ScreeningStatus::EmptyName => self.empty_name,
            ScreeningStatus::Blocked => self.blocked,
        }
    }

    pub fn total(&self) -> usize {
        self.adverse + self.no_adverse + self.empty_name + self.blocked
    }
}

/// A screening job as exposed by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    /// `floor(processed_rows * 100 / total_rows)`; 100 once completed.
    pub progress: u8,
    /// Human-readable current step.
    pub message: String,
    /// Uploaded file the job reads.
    pub filename: String,
    /// `<output root>/<job_id>`; the result workbook is written here.
    pub output_dir: PathBuf,
    pub total_rows: usize,
    pub processed_rows: usize,
    #[serde(default)]
    pub counts: StatusCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(filename: &str, output_root: &Path) -> Self {
        let job_id = uuid::Uuid::new_v4().to_string();
        Self {
            output_dir: output_root.join(&job_id),
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            message: "Starting...".to_string(),
            filename: filename.to_string(),
            total_rows: 0,
            processed_rows: 0,
            counts: StatusCounts::default(),
            output_path: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_become(next) {
            return Err(JobError::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    fn recompute_progress(&mut self) {
        self.progress = if self.total_rows == 0 {
            0
        } else {
            (self.processed_rows * 100 / self.total_rows) as u8
        };
    }
}

/// Number of jobs in each state.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Thread-safe job registry shared by the server and job runners.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Applies `update` to one job under the write lock and returns the
    /// updated snapshot. A failed update leaves the job untouched.
    fn update<F>(&self, job_id: &str, update: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobError>,
    {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let mut next = job.clone();
        update(&mut next)?;
        *job = next.clone();
        Ok(next)
    }

    /// Registers a new job in `Pending`. Its output directory is a fresh
    /// subdirectory of `output_root` named after the job id.
    pub fn create(&self, filename: &str, output_root: &Path) -> Job {
        let job = Job::new(filename, output_root);
        self.write().insert(job.job_id.clone(), job.clone());
        job
    }

    /// `Pending -> Processing` with the row count fixed.
    pub fn start_processing(&self, job_id: &str, total_rows: usize) -> Result<Job, JobError> {
        self.update(job_id, |job| {
            job.transition(JobStatus::Processing)?;
            job.total_rows = total_rows;
            job.processed_rows = 0;
            job.recompute_progress();
            job.message = format!("Screening {} entities...", total_rows);
            Ok(())
        })
    }

    /// Counts one completed screening task.
    pub fn record_processed(
        &self,
        job_id: &str,
        status: ScreeningStatus,
    ) -> Result<Job, JobError> {
        self.update(job_id, |job| {
            if job.status != JobStatus::Processing {
                return Err(JobError::InvalidTransition {
                    job_id: job.job_id.clone(),
                    from: job.status.to_string(),
                    to: JobStatus::Processing.to_string(),
                });
            }
            if job.processed_rows >= job.total_rows {
                return Err(JobError::ProgressOverflow {
                    job_id: job.job_id.clone(),
                    total: job.total_rows,
                });
            }
            job.processed_rows += 1;
            job.counts.record(status);
            job.recompute_progress();
            job.message = format!("Screened {} of {}", job.processed_rows, job.total_rows);
            Ok(())
        })
    }

    /// `Processing -> Completed`. Every row must have been counted.
    pub fn complete(&self, job_id: &str, output_path: &str) -> Result<Job, JobError> {
        self.update(job_id, |job| {
            if job.status == JobStatus::Processing && job.processed_rows != job.total_rows {
                return Err(JobError::Incomplete {
                    job_id: job.job_id.clone(),
                    processed: job.processed_rows,
                    total: job.total_rows,
                });
            }
            job.transition(JobStatus::Completed)?;
            job.progress = 100;
            job.message = "Processing completed successfully!".to_string();
            job.output_path = Some(output_path.to_string());
            job.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    /// `Pending | Processing -> Failed`. `processed_rows` stays where it was.
    pub fn fail(&self, job_id: &str, error: &str) -> Result<Job, JobError> {
        self.update(job_id, |job| {
            job.transition(JobStatus::Failed)?;
            job.message = format!("Error: {}", error);
            job.error = Some(error.to_string());
            job.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.read().get(job_id).cloned()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.read().contains_key(job_id)
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn counts(&self) -> JobCounts {
        let jobs = self.read();
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store_with_job() -> (JobStore, String) {
        let store = JobStore::new();
        let job = store.create("input.xlsx", Path::new("/tmp/out"));
        (store, job.job_id)
    }

    #[test]
    fn test_create_is_pending() {
        let (store, id) = store_with_job();
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.filename, "input.xlsx");
        assert_eq!(job.output_dir, Path::new("/tmp/out").join(&id));
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_happy_path() {
        let (store, id) = store_with_job();
        store.start_processing(&id, 3).unwrap();

        let job = store.record_processed(&id, ScreeningStatus::Adverse).unwrap();
        assert_eq!(job.processed_rows, 1);
        assert_eq!(job.progress, 33);

        store.record_processed(&id, ScreeningStatus::NoAdverse).unwrap();
        let job = store.record_processed(&id, ScreeningStatus::Blocked).unwrap();
        assert_eq!(job.progress, 100);
        assert_eq!(job.counts.total(), 3);
        assert_eq!(job.counts.get(ScreeningStatus::Blocked), 1);

        let job = store.complete(&id, "/tmp/out/result.xlsx").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_rows, job.total_rows);
        assert_eq!(job.output_path.as_deref(), Some("/tmp/out/result.xlsx"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_progress_is_floored() {
        let (store, id) = store_with_job();
        store.start_processing(&id, 7).unwrap();
        let job = store.record_processed(&id, ScreeningStatus::NoAdverse).unwrap();
        assert_eq!(job.progress, 14);
    }

    #[test]
    fn test_empty_job_can_complete() {
        let (store, id) = store_with_job();
        store.start_processing(&id, 0).unwrap();
        let job = store.complete(&id, "out.xlsx").unwrap();
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_overflow_rejected() {
        let (store, id) = store_with_job();
        store.start_processing(&id, 1).unwrap();
        store.record_processed(&id, ScreeningStatus::Adverse).unwrap();
        let err = store
            .record_processed(&id, ScreeningStatus::Adverse)
            .unwrap_err();
        assert!(matches!(err, JobError::ProgressOverflow { total: 1, .. }));
        assert_eq!(store.get(&id).unwrap().processed_rows, 1);
    }

    #[test]
    fn test_complete_requires_all_rows() {
        let (store, id) = store_with_job();
        store.start_processing(&id, 2).unwrap();
        store.record_processed(&id, ScreeningStatus::Adverse).unwrap();
        let err = store.complete(&id, "out.xlsx").unwrap_err();
        assert!(matches!(err, JobError::Incomplete { processed: 1, total: 2, .. }));
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_illegal_transitions() {
        let (store, id) = store_with_job();

        // Pending -> Completed
        assert!(matches!(
            store.complete(&id, "x").unwrap_err(),
            JobError::InvalidTransition { .. }
        ));
        // Pending does not count progress
        assert!(store.record_processed(&id, ScreeningStatus::Adverse).is_err());

        store.start_processing(&id, 1).unwrap();
        // Processing -> Processing
        assert!(store.start_processing(&id, 1).is_err());

        store.fail(&id, "disk full").unwrap();
        // Out of a terminal state
        assert!(store.fail(&id, "again").is_err());
        assert!(store.start_processing(&id, 1).is_err());
        assert!(store.record_processed(&id, ScreeningStatus::Adverse).is_err());

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("disk full"));
        assert_eq!(job.message, "Error: disk full");
    }

    #[test]
    fn test_fail_freezes_processed_rows() {
        let (store, id) = store_with_job();
        store.start_processing(&id, 5).unwrap();
        store.record_processed(&id, ScreeningStatus::Adverse).unwrap();
        store.record_processed(&id, ScreeningStatus::Adverse).unwrap();
        let job = store.fail(&id, "boom").unwrap();
        assert_eq!(job.processed_rows, 2);
        assert_eq!(job.progress, 40);
    }

    #[test]
    fn test_unknown_job() {
        let store = JobStore::new();
        assert_eq!(
            store.start_processing("nope", 1).unwrap_err(),
            JobError::NotFound("nope".to_string())
        );
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(JobStore::new());
        let id = store.create("input.xlsx", Path::new("/tmp")).job_id;
        store.start_processing(&id, 800).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.record_processed(&id, ScreeningStatus::NoAdverse).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let job = store.get(&id).unwrap();
        assert_eq!(job.processed_rows, 800);
        assert_eq!(job.counts.no_adverse, 800);
    }

    #[test]
    fn test_list_newest_first_and_counts() {
        let store = JobStore::new();
        let first = store.create("a.xlsx", Path::new("/tmp/a")).job_id;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create("b.xlsx", Path::new("/tmp/b")).job_id;
        store.fail(&first, "bad").unwrap();

        let jobs = store.list();
        assert_eq!(jobs[0].job_id, second);
        assert_eq!(jobs[1].job_id, first);

        let counts = store.counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_serialized_keys() {
        let (store, id) = store_with_job();
        let json = serde_json::to_value(store.get(&id).unwrap()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["job_id"], id.as_str());
        assert_eq!(json["processed_rows"], 0);
        assert_eq!(json["total_rows"], 0);
        assert_eq!(json["message"], "Starting...");
        assert!(json.get("error").is_none());
    }
}
