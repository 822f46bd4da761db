//! Test harness for isolated job runs.
//!
//! The `TestHarness` struct provides:
//! - Temporary upload and output directories
//! - Input workbook creation
//! - A job store and a runner wired to a scripted provider

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use screener::broadcast::{Job, JobProgressBroadcaster, JobStore};
use screener::pipeline::{JobRequest, JobRunner, JobSummary, PipelineError};
use screener::search::{Pause, SearchPolicy, SearchProvider};
use screener::sheet::{reader::read_first_sheet, write_table, CellValue};

use super::builders::RecordingPause;

/// Test harness providing an isolated environment for job runs.
pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub store: Arc<JobStore>,
    pub broadcaster: JobProgressBroadcaster,
    pub pause: Arc<RecordingPause>,
    pub worker_count: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let output_dir = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");

        Self {
            temp_dir,
            upload_dir,
            output_dir,
            store: Arc::new(JobStore::new()),
            broadcaster: JobProgressBroadcaster::new(1024),
            pause: Arc::new(RecordingPause::default()),
            worker_count: 4,
        }
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes an input workbook with `<id_header>, Name, Status` columns.
    pub fn write_entities(&self, filename: &str, id_header: &str, rows: &[(&str, &str)]) -> PathBuf {
        let table: Vec<Vec<CellValue>> = rows
            .iter()
            .map(|(id, name)| vec![(*id).into(), (*name).into(), "".into()])
            .collect();
        self.write_table(filename, &[id_header, "Name", "Status"], &table)
    }

    /// Writes an arbitrary single-sheet workbook into the upload directory.
    pub fn write_table(&self, filename: &str, headers: &[&str], rows: &[Vec<CellValue>]) -> PathBuf {
        let path = self.upload_dir.join(filename);
        write_table(&path, headers, rows).expect("Failed to write input workbook");
        path
    }

    pub fn runner(&self, provider: Arc<dyn SearchProvider>) -> JobRunner {
        let pause: Arc<dyn Pause> = self.pause.clone();
        JobRunner::new(
            Arc::clone(&self.store),
            provider,
            SearchPolicy::default(),
            self.worker_count,
        )
        .with_broadcaster(self.broadcaster.clone())
        .with_pause(pause)
    }

    /// Registers a job for `input` and returns the request to run it.
    pub fn request(&self, input: &Path, filters: &[&str]) -> (Job, JobRequest) {
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let job = self.store.create(&filename, &self.output_dir);
        let request = JobRequest {
            job_id: job.job_id.clone(),
            input_path: input.to_path_buf(),
            output_dir: job.output_dir.clone(),
            filters: filters.iter().map(|f| f.to_string()).collect(),
        };
        (job, request)
    }

    /// Runs a job to completion on the calling thread.
    pub fn run_job(
        &self,
        provider: Arc<dyn SearchProvider>,
        input: &Path,
        filters: &[&str],
    ) -> (Job, Result<JobSummary, PipelineError>) {
        let (job, request) = self.request(input, filters);
        let result = self.runner(provider).run(&request);
        let job = self.store.get(&job.job_id).expect("job vanished from store");
        (job, result)
    }

    /// Reads every row of a result workbook, header included.
    pub fn read_output(&self, path: &Path) -> Vec<Vec<String>> {
        let file = File::open(path).expect("Failed to open output");
        let mut archive = zip::ZipArchive::new(file).expect("Output is not a zip archive");
        read_first_sheet(&mut archive).expect("Failed to read output sheet")
    }

    /// `.xlsx` files in a directory.
    pub fn xlsx_files(&self, dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().map(|e| e == "xlsx").unwrap_or(false))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
