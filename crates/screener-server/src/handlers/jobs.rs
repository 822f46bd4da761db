//! Job status, listing and result download.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use screener::broadcast::{Job, JobCounts};

use crate::error::ApiError;
use crate::state::SharedState;

/// Result file names listed in a status payload.
const MAX_LISTED_RESULTS: usize = 10;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// GET /api/status/:job_id: the job plus what its output directory holds.
pub async fn status(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job = find_job(&state, &job_id)?;
    let files = result_files(&job.output_dir).await;

    let mut payload = serde_json::to_value(&job).map_err(ApiError::internal)?;
    if let Value::Object(ref mut map) = payload {
        map.insert("result_count".to_string(), files.len().into());
        map.insert("has_results".to_string(), (!files.is_empty()).into());
        map.insert(
            "result_files".to_string(),
            files
                .into_iter()
                .take(MAX_LISTED_RESULTS)
                .collect::<Vec<_>>()
                .into(),
        );
    }

    Ok(Json(payload))
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub status: &'static str,
    pub jobs: Vec<Job>,
    pub counts: JobCounts,
}

/// GET /api/jobs: every job, newest first.
pub async fn list_jobs(State(state): State<SharedState>) -> Json<JobListResponse> {
    Json(JobListResponse {
        status: "success",
        jobs: state.jobs.list(),
        counts: state.jobs.counts(),
    })
}

/// GET /api/download/:job_id: the job's result workbook as an attachment.
pub async fn download(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = find_job(&state, &job_id)?;

    if !tokio::fs::try_exists(&job.output_dir).await.unwrap_or(false) {
        return Err(ApiError::not_found("Results directory not found"));
    }

    let file_name = result_files(&job.output_dir)
        .await
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("No result files found"))?;
    let path: PathBuf = job.output_dir.join(&file_name);

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        debug!("Result file {} unreadable: {}", file_name, e);
        ApiError::not_found("Result file not accessible")
    })?;

    info!("Serving {} for job {}", file_name, job.job_id);

    let disposition = format!("attachment; filename=\"results_{}.xlsx\"", job.job_id);
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

fn find_job(state: &SharedState, job_id: &str) -> Result<Job, ApiError> {
    state
        .jobs
        .get(job_id)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// `.xlsx` file names in `dir`, sorted. A missing directory has none.
async fn result_files(dir: &FsPath) -> Vec<String> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".xlsx") {
            files.push(name);
        }
    }
    files.sort();
    files
}
