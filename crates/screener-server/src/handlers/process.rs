//! POST /api/process: registers a screening job for an uploaded file and
//! starts it in the background.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, info};
use serde::{Deserialize, Serialize};

use screener::pipeline::JobRequest;
use screener::sanitize::is_safe_file_name;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// Stored upload name returned by `/api/upload`.
    pub filename: String,
    #[serde(default)]
    pub filter: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: &'static str,
    pub job_id: String,
}

pub async fn process(
    State(state): State<SharedState>,
    session: Session,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;

    if !is_safe_file_name(&request.filename) {
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let input_path = state.config.upload_directory.join(&request.filename);
    if !tokio::fs::try_exists(&input_path).await.unwrap_or(false) {
        return Err(ApiError::bad_request("File not found"));
    }

    let filters = state.resolve_filters(request.filter, &session.id);

    let job = state
        .jobs
        .create(&request.filename, &state.config.output_directory);
    tokio::fs::create_dir_all(&job.output_dir).await?;

    info!(
        "Processing {} with {} keyword filter(s) as job {}",
        request.filename,
        filters.len(),
        job.job_id
    );

    let job_request = JobRequest {
        job_id: job.job_id.clone(),
        input_path,
        output_dir: job.output_dir.clone(),
        filters,
    };

    // The job reports its own outcome to the store; the handle is detached.
    if let Err(e) = state.runner.spawn(job_request) {
        error!("Failed to start job {}: {}", job.job_id, e);
        if let Err(store_err) = state.jobs.fail(&job.job_id, &e.to_string()) {
            error!("Failed to mark job {} as failed: {}", job.job_id, store_err);
        }
        return Err(ApiError::internal(format!("Failed to start job: {}", e)));
    }

    let mut response = Json(ProcessResponse {
        status: "success",
        job_id: job.job_id,
    })
    .into_response();
    session.attach(&mut response);
    Ok(response)
}
