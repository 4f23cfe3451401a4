use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::Claims;
use axum::{
    Extension,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

pub const MERGED_FILENAME: &str = "merged.pdf";

#[utoipa::path(
    post,
    path = "/merge",
    responses(
        (status = 200, description = "Merged PDF download", content_type = "application/pdf"),
        (status = 400, description = "No files to merge"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Merge failed; staged files were discarded")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "staging"
)]
pub async fn merge_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    let merged = state.staging.merge(&claims.sid).await?;

    Ok((
        [
            (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", MERGED_FILENAME),
            ),
        ],
        merged.bytes,
    )
        .into_response())
}
