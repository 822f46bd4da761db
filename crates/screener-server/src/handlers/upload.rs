//! POST /api/upload: stores one `.xlsx` upload for a later process call.

use axum::extract::{Multipart, State};
use axum::Json;
use log::info;
use serde::Serialize;

use screener::sanitize::{has_xlsx_extension, sanitize_file_name};

use crate::error::ApiError;
use crate::state::SharedState;

const FILE_FIELD: &str = "file";
const FALLBACK_NAME: &str = "upload.xlsx";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: &'static str,
    /// Stored name, to be passed to `/api/process`.
    pub filename: String,
    pub original_name: String,
}

pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.trim().is_empty() {
            return Err(ApiError::bad_request("No file selected"));
        }
        if !has_xlsx_extension(&original_name) {
            return Err(ApiError::bad_request("Only .xlsx files allowed"));
        }

        let data = field.bytes().await?;

        let mut safe_name = sanitize_file_name(&original_name);
        if !has_xlsx_extension(&safe_name) {
            safe_name = FALLBACK_NAME.to_string();
        }
        let stored_name = format!("{}_{}", uuid::Uuid::new_v4(), safe_name);

        let upload_dir = &state.config.upload_directory;
        tokio::fs::create_dir_all(upload_dir).await?;
        tokio::fs::write(upload_dir.join(&stored_name), &data).await?;

        info!(
            "File uploaded: original name '{}', saved as '{}', {} bytes",
            original_name,
            stored_name,
            data.len()
        );

        return Ok(Json(UploadResponse {
            status: "success",
            message: "File uploaded successfully",
            filename: stored_name,
            original_name,
        }));
    }

    Err(ApiError::bad_request("No file provided"))
}
