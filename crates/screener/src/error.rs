use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Search provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid environment override {name}='{value}': {reason}")]
    InvalidOverride {
        name: String,
        value: String,
        reason: String,
    },
}

/// Input or output spreadsheet problems. Raised before any screening starts
/// when the input is unusable, so a job never produces partial output.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Failed to open spreadsheet '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid xlsx archive: {0}")]
    Archive(String),

    #[error("Worksheet not found: {0}")]
    MissingWorksheet(String),

    #[error("Malformed spreadsheet XML in {part}: {reason}")]
    Xml { part: String, reason: String },

    #[error("Spreadsheet must contain columns {expected}; found: {found}")]
    MissingColumns { expected: String, found: String },

    #[error("Failed to write spreadsheet '{path}': {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Failures of the external search capability. The `Display` text is what
/// the adapter inspects to tell blocking apart from other failures.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Search request failed: {0}")]
    Transport(String),

    #[error("Search rate limit hit: {0}")]
    RateLimited(String),

    #[error("Search returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse search response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Screening task for row {row} failed: {reason}")]
    TaskFailed { row: usize, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Job {job_id} already processed all {total} rows")]
    ProgressOverflow { job_id: String, total: usize },

    #[error("Job {job_id} finished with {processed} of {total} rows processed")]
    Incomplete {
        job_id: String,
        processed: usize,
        total: usize,
    },
}

pub type Result<T> = std::result::Result<T, ScreenerError>;
