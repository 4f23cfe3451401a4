use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use validator::Validate;

use super::types::*;

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Staged files in merge order", body = [StagedFileEntry]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "staging"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<StagedFileEntry>>, AppError> {
    let files = state.staging.list(&claims.sid).await?;
    Ok(Json(files.into_iter().map(StagedFileEntry::from).collect()))
}

#[utoipa::path(
    post,
    path = "/remove/{id}",
    params(
        ("id" = String, Path, description = "Staged file ID")
    ),
    responses(
        (status = 200, description = "File removed", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "staging"
)]
pub async fn remove_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.staging.remove_file(&claims.sid, &id).await?;
    Ok(Json(MessageResponse {
        message: format!("{} removed", removed.display_name),
    }))
}

#[utoipa::path(
    post,
    path = "/clear",
    responses(
        (status = 200, description = "All staged files removed", body = ClearResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "staging"
)]
pub async fn clear_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ClearResponse>, AppError> {
    let cleared = state.staging.clear(&claims.sid).await?;
    Ok(Json(ClearResponse {
        message: "All files cleared".to_string(),
        cleared,
    }))
}

#[utoipa::path(
    post,
    path = "/reorder",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Ledger reordered", body = ReorderResponse),
        (status = 400, description = "Order is not a permutation of the staged ids"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "staging"
)]
pub async fn reorder_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ReorderResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let files = state.staging.reorder(&claims.sid, &req.order).await?;
    Ok(Json(ReorderResponse {
        message: "Files reordered".to_string(),
        files: files.into_iter().map(StagedFileEntry::from).collect(),
    }))
}
