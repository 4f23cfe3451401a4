use crate::utils::validation::ValidationError;
use bytes::Bytes;
use thiserror::Error;

/// One file as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// In-memory result of a successful merge.
#[derive(Debug)]
pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub source_count: usize,
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("{0}")]
    Validation(String),

    #[error("File not found")]
    NotFound,

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Session is no longer active")]
    SessionClosed,

    #[error("Upload failed: {0:#}")]
    UploadFailed(anyhow::Error),

    #[error("Merge failed: {0}")]
    MergeFailed(String),
}

impl From<ValidationError> for StagingError {
    fn from(err: ValidationError) -> Self {
        match err.code {
            "FILE_TOO_LARGE" => StagingError::PayloadTooLarge(err.message),
            _ => StagingError::Validation(err.message),
        }
    }
}
