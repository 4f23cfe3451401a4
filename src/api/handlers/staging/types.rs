use crate::models::StagedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<UploadedFile>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ClearResponse {
    pub message: String,
    pub cleared: usize,
}

#[derive(Serialize, ToSchema)]
pub struct StagedFileEntry {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<StagedFile> for StagedFileEntry {
    fn from(file: StagedFile) -> Self {
        Self {
            id: file.id,
            name: file.display_name,
            size: file.size,
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct ReorderRequest {
    #[validate(length(max = 1024, message = "Too many ids in order"))]
    pub order: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ReorderResponse {
    pub message: String,
    pub files: Vec<StagedFileEntry>,
}
