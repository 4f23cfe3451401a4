use crate::services::identity::AuthError;
use crate::services::staging_service::StagingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

const UPLOAD_FAILED_MESSAGE: &str =
    "An error occurred while uploading files. Please try again later.";
const MERGE_FAILED_MESSAGE: &str = "An error occurred while merging files. Please try again later.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    /// Server-side failure with a fixed client message; `detail` is only logged.
    #[error("{public}: {detail}")]
    Failed { public: &'static str, detail: String },

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Failed { public, detail } => {
                tracing::error!("{} ({})", public, detail);
                (StatusCode::INTERNAL_SERVER_ERROR, public.to_string())
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StagingError> for AppError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::Validation(msg) => AppError::BadRequest(msg),
            StagingError::NotFound => AppError::NotFound("File not found".to_string()),
            StagingError::PayloadTooLarge(msg) => AppError::PayloadTooLarge(msg),
            StagingError::SessionClosed => {
                AppError::Unauthorized("Session is no longer active".to_string())
            }
            StagingError::UploadFailed(e) => AppError::Failed {
                public: UPLOAD_FAILED_MESSAGE,
                detail: format!("{:#}", e),
            },
            StagingError::MergeFailed(detail) => AppError::Failed {
                public: MERGE_FAILED_MESSAGE,
                detail,
            },
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
