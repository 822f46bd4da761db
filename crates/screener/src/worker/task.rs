use crate::error::WorkerError;
use crate::screening::{EntityRecord, ScreeningResult};

/// One entity queued for screening.
#[derive(Debug, Clone)]
pub struct ScreeningTask {
    pub record: EntityRecord,
}

impl ScreeningTask {
    pub fn new(record: EntityRecord) -> Self {
        Self { record }
    }

    pub fn row(&self) -> usize {
        self.record.row
    }
}

/// What a worker sends back for one task.
#[derive(Debug)]
pub struct TaskResult {
    pub row: usize,
    pub success: bool,
    pub result: Option<ScreeningResult>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(result: ScreeningResult) -> Self {
        Self {
            row: result.row,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(row: usize, error: String) -> Self {
        Self {
            row,
            success: false,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<ScreeningResult, WorkerError> {
        match self.result {
            Some(result) if self.success => Ok(result),
            _ => Err(WorkerError::TaskFailed {
                row: self.row,
                reason: self
                    .error
                    .unwrap_or_else(|| "task produced no result".to_string()),
            }),
        }
    }
}
