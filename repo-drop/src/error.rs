//! Request-level errors of the upload server and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use repo_drop_core::record::RecordError;
use repo_drop_core::synchronise::SyncError;
use repo_drop_core::target::TargetError;
use thiserror::Error;
use tracing::{error, warn};

use crate::api::UploadResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Repository URL, GitHub token and files are required")]
    MissingFields,
    #[error("Invalid GitHub repository URL")]
    InvalidRepositoryUrl(#[from] TargetError),
    #[error("File too large! Maximum {}MB per file.", .0 / (1024 * 1024))]
    FileTooLarge(u64),
    #[error("Too many files! Maximum {0} files.")]
    TooManyFiles(usize),
    #[error("invalid file path: {0}")]
    InvalidPath(#[from] RecordError),
    #[error("malformed multipart request: {0}")]
    Multipart(String),
    #[error("{0}")]
    Rejected(#[from] SyncError),
    #[error("Upload timed out after {0}s while receiving files")]
    IntakeTimeout(u64),
    #[error("failed to spool upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload batch aborted: {0}")]
    Aborted(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Io(_) | AppError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IntakeTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Upload request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Upload request rejected");
        }
        (status, Json(UploadResponse::rejected(self.to_string()))).into_response()
    }
}
