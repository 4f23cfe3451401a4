use crate::AppState;
use crate::api::error::AppError;
use crate::services::staging_service::UploadCandidate;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::BytesMut;

use super::types::*;

/// Multipart field names that carry files.
const FILE_FIELDS: [&str; 3] = ["files[]", "files", "file"];

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Buffers one file field, refusing to grow past `max_size` bytes.
async fn read_capped(field: &mut Field<'_>, max_size: usize) -> Result<BytesMut, AppError> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if data.len() + chunk.len() > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds maximum allowed size of {} MB",
                max_size / 1024 / 1024
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "One or more PDF files in the `files[]` field"),
    responses(
        (status = 200, description = "Files staged", body = UploadResponse),
        (status = 400, description = "No files, disallowed extension or not a PDF"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "staging"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart =
        multipart.map_err(|_| AppError::BadRequest("No files selected".to_string()))?;
    let max_size = state.config.max_content_length;
    let mut candidates = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            continue;
        }
        if candidates.len() >= state.config.max_files_per_upload {
            return Err(AppError::BadRequest(format!(
                "At most {} files can be uploaded at once",
                state.config.max_files_per_upload
            )));
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let data = read_capped(&mut field, max_size).await?;

        // Browsers submit an empty part when nothing was picked.
        if filename.is_empty() && data.is_empty() {
            continue;
        }

        candidates.push(UploadCandidate {
            filename,
            content_type,
            data: data.freeze(),
        });
    }

    let staged = state.staging.stage_uploads(&claims.sid, candidates).await?;

    Ok(Json(UploadResponse {
        message: format!("{} file(s) uploaded successfully", staged.len()),
        files: staged
            .into_iter()
            .map(|f| UploadedFile {
                id: f.id,
                name: f.display_name,
            })
            .collect(),
    }))
}
