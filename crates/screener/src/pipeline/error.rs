use thiserror::Error;

/// A fatal job error. Its message becomes the job's error text.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Sheet(#[from] crate::error::SheetError),

    #[error("Screening aborted: {0}")]
    Worker(#[from] crate::error::WorkerError),

    #[error(transparent)]
    Job(#[from] crate::error::JobError),

    #[error("Failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}
