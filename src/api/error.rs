use crate::services::csv_parser::ParseError;
use crate::services::staging::StagingError;
use crate::services::storage::UploadError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const NO_FILE_MESSAGE: &str = "No file uploaded";
pub const FAILURE_MESSAGE: &str = "Error processing upload";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<StagingError> for AppError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::TooLarge { limit } => {
                AppError::PayloadTooLarge(format!("Upload exceeds {} bytes", limit))
            }
            StagingError::Body(msg) if msg.contains("length limit exceeded") => {
                AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
            }
            StagingError::Body(msg) => {
                tracing::debug!("Unreadable upload body: {}", msg);
                AppError::NoFile
            }
            StagingError::Io(e) => AppError::Internal(format!("Staging failed: {}", e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NoFile => (StatusCode::BAD_REQUEST, NO_FILE_MESSAGE.to_string()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Parse(e) => {
                tracing::error!("Parse error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE.to_string())
            }
            AppError::Upload(e) => {
                tracing::error!("Upload error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE.to_string())
            }
        };

        (status, message).into_response()
    }
}
