use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;
use log::{error, info, warn};
use tracing::info_span;

use crate::broadcast::{JobProgressBroadcaster, JobStatus, JobStore, StatusCounts};
use crate::config::ScreenerConfig;
use crate::error::JobError;
use crate::matcher::KeywordMatcher;
use crate::pipeline::error::PipelineError;
use crate::pipeline::progress::{ProgressEvent, ProgressReporter, TrackerProgress};
use crate::sanitize;
use crate::screening::{sort_by_input_order, Screener};
use crate::search::{Pause, SearchAdapter, SearchPolicy, SearchProvider, ThreadSleep};
use crate::sheet::{output_file_name, read_entities, write_results};

/// One screening job to run.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Id of a job already registered in the store.
    pub job_id: String,
    pub input_path: PathBuf,
    /// Per-job directory the result workbook is written into.
    pub output_dir: PathBuf,
    pub filters: Vec<String>,
}

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub output_path: PathBuf,
    pub total: usize,
    pub counts: StatusCounts,
    pub elapsed: Duration,
}

/// Runs screening jobs end to end: read the sheet, screen every entity,
/// write the result workbook, and keep the job store current throughout.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<JobStore>,
    broadcaster: Option<JobProgressBroadcaster>,
    provider: Arc<dyn SearchProvider>,
    policy: SearchPolicy,
    pause: Arc<dyn Pause>,
    worker_count: usize,
}

impl JobRunner {
    pub fn new(
        store: Arc<JobStore>,
        provider: Arc<dyn SearchProvider>,
        policy: SearchPolicy,
        worker_count: usize,
    ) -> Self {
        Self {
            store,
            broadcaster: None,
            provider,
            policy,
            pause: Arc::new(ThreadSleep),
            worker_count,
        }
    }

    pub fn from_config(
        config: &ScreenerConfig,
        store: Arc<JobStore>,
        provider: Arc<dyn SearchProvider>,
    ) -> Self {
        Self::new(
            store,
            provider,
            SearchPolicy::from_config(&config.search),
            config.worker_count,
        )
    }

    pub fn with_broadcaster(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Replaces the sleep used for backoff and throttling.
    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Runs the job on a dedicated background thread.
    pub fn spawn(
        &self,
        request: JobRequest,
    ) -> std::io::Result<JoinHandle<Result<JobSummary, PipelineError>>> {
        let runner = self.clone();
        let short_id: String = request.job_id.chars().take(8).collect();

        thread::Builder::new()
            .name(format!("screening-job-{}", short_id))
            .spawn(move || runner.run(&request))
    }

    /// Runs the job on the calling thread. The outcome is also recorded in
    /// the job store. Only a `Pending` job can run.
    pub fn run(&self, request: &JobRequest) -> Result<JobSummary, PipelineError> {
        let _span = info_span!(
            "screening_job",
            job_id = %request.job_id,
            filename = %sanitize::redact_path(&request.input_path),
        )
        .entered();

        let job = self
            .store
            .get(&request.job_id)
            .ok_or_else(|| JobError::NotFound(request.job_id.clone()))?;
        if job.status != JobStatus::Pending {
            warn!("Job {} is {}, refusing to run it again", job.job_id, job.status);
            return Err(JobError::InvalidTransition {
                job_id: job.job_id,
                from: job.status.to_string(),
                to: JobStatus::Processing.to_string(),
            }
            .into());
        }

        let mut tracker = TrackerProgress::new(&request.job_id, Arc::clone(&self.store));
        if let Some(ref broadcaster) = self.broadcaster {
            tracker = tracker.with_broadcaster(broadcaster.clone());
        }
        let progress: Arc<dyn ProgressReporter> = Arc::new(tracker);

        info!("Job {} started", request.job_id);
        let started = Instant::now();

        match self.execute(request, &progress, started) {
            Ok(summary) => {
                progress.report(ProgressEvent::Completed {
                    output_path: summary.output_path.display().to_string(),
                });
                log_summary(&request.job_id, &summary);
                Ok(summary)
            }
            Err(e) => {
                error!("Job {} failed: {}", request.job_id, error_chain(&e));
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        request: &JobRequest,
        progress: &Arc<dyn ProgressReporter>,
        started: Instant,
    ) -> Result<JobSummary, PipelineError> {
        let data = {
            let _step = info_span!("read_input").entered();
            read_entities(&request.input_path)?
        };
        let total = data.records.len();
        progress.report(ProgressEvent::Started { total });
        info!("Found {} rows to process", total);

        let results = {
            let _step = info_span!("screen_entities", total).entered();
            let adapter = SearchAdapter::new(
                Arc::clone(&self.provider),
                Arc::new(KeywordMatcher::new(&request.filters)),
                self.policy.clone(),
                Arc::clone(&self.pause),
            );
            let screener = Screener::new(adapter, self.worker_count);
            let mut results = screener.run(data.records, Arc::clone(progress))?;
            sort_by_input_order(&mut results);
            results
        };

        let output_path = {
            let _step = info_span!("write_output").entered();
            std::fs::create_dir_all(&request.output_dir)?;
            let output_path = request
                .output_dir
                .join(output_file_name(Local::now().naive_local()));
            write_results(&output_path, &data.id_header, &results)?;
            output_path
        };

        let mut counts = StatusCounts::default();
        for result in &results {
            counts.record(result.status);
        }

        Ok(JobSummary {
            output_path,
            total,
            counts,
            elapsed: started.elapsed(),
        })
    }
}

fn log_summary(job_id: &str, summary: &JobSummary) {
    let secs = summary.elapsed.as_secs_f64();
    info!(
        "Job {} complete: {} processed, {} adverse, {} not adverse, {} empty, {} blocked in {:.2}s ({:.2} min)",
        job_id,
        summary.total,
        summary.counts.adverse,
        summary.counts.no_adverse,
        summary.counts.empty_name,
        summary.counts.blocked,
        secs,
        secs / 60.0
    );
    info!(
        "Results saved to {}",
        sanitize::redact_path(&summary.output_path)
    );
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, SheetError};
    use crate::search::{NoPause, ResultItem};
    use crate::sheet::write_table;
    use tempfile::TempDir;

    struct EchoProvider;

    impl SearchProvider for EchoProvider {
        fn search(&self, query: &str, max: usize) -> Result<Vec<ResultItem>, ProviderError> {
            Ok((0..max)
                .map(|i| ResultItem::new(format!("{} result {}", query, i), "", ""))
                .collect())
        }
    }

    fn runner(store: Arc<JobStore>) -> JobRunner {
        JobRunner::new(store, Arc::new(EchoProvider), SearchPolicy::default(), 2)
            .with_pause(Arc::new(NoPause))
    }

    #[test]
    fn test_run_writes_output_and_completes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.xlsx");
        write_table(
            &input,
            &["ID", "Name", "Status"],
            &[
                vec!["1".into(), "Fraud Watch".into(), "".into()],
                vec!["2".into(), "".into(), "".into()],
            ],
        )
        .unwrap();

        let store = Arc::new(JobStore::new());
        let job = store.create("input.xlsx", &dir.path().join("out"));
        let output_dir = job.output_dir.clone();

        let summary = runner(Arc::clone(&store))
            .run(&JobRequest {
                job_id: job.job_id.clone(),
                input_path: input,
                output_dir: output_dir.clone(),
                filters: vec!["fraud".to_string()],
            })
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.counts.adverse, 1);
        assert_eq!(summary.counts.empty_name, 1);
        assert!(summary.output_path.starts_with(&output_dir));
        assert!(summary.output_path.exists());

        let job = store.get(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_rows, 2);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_missing_columns_fail_the_job() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.xlsx");
        write_table(&input, &["ID", "Name"], &[vec!["1".into(), "X".into()]]).unwrap();

        let store = Arc::new(JobStore::new());
        let job = store.create("input.xlsx", &dir.path().join("out"));
        let output_dir = job.output_dir.clone();

        let err = runner(Arc::clone(&store))
            .run(&JobRequest {
                job_id: job.job_id.clone(),
                input_path: input,
                output_dir: output_dir.clone(),
                filters: vec!["fraud".to_string()],
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Sheet(SheetError::MissingColumns { .. })));

        let job = store.get(&job.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("Status"));
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_spawn_runs_in_background() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JobStore::new());
        let job = store.create("missing.xlsx", dir.path());

        let handle = runner(Arc::clone(&store))
            .spawn(JobRequest {
                job_id: job.job_id.clone(),
                input_path: dir.path().join("missing.xlsx"),
                output_dir: job.output_dir.clone(),
                filters: vec![],
            })
            .unwrap();

        assert!(handle.join().unwrap().is_err());
        assert_eq!(store.get(&job.job_id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_unknown_job_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JobStore::new());

        let err = runner(store)
            .run(&JobRequest {
                job_id: "nope".to_string(),
                input_path: dir.path().join("input.xlsx"),
                output_dir: dir.path().join("out"),
                filters: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Job(JobError::NotFound(_))));
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = PipelineError::Sheet(SheetError::Open {
            path: PathBuf::from("/x.xlsx"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        });
        let chain = error_chain(&err);
        assert!(chain.starts_with("Failed to open spreadsheet '/x.xlsx'"));
        assert!(chain.ends_with("gone"));
    }
}
