use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use crate::models::ApiResponse;

// business codes carried in the response envelope
pub const CODE_SUCCESS: i32 = 0;
pub const CODE_INVALID: i32 = 400;
pub const CODE_UNAUTHORIZED: i32 = 401;
pub const CODE_TOO_MANY_REQUESTS: i32 = 429;
pub const CODE_ERROR: i32 = 500;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("file size {size} exceeds the limit of {max} bytes")]
    LimitExceeded { size: u64, max: u64 },
    #[error("upload session not found: {0}")]
    SessionNotFound(String),
    #[error("chunk index {index} out of range (total chunks {total})")]
    ChunkOutOfRange { index: usize, total: usize },
    #[error("checksum mismatch for chunk {index}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("upload incomplete: received {received}/{total} chunks")]
    IncompleteUpload { received: usize, total: usize },
    #[error("assembly failed: {0}")]
    AssemblyFailed(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("too many requests, retry later")]
    RateLimited,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// business code for the envelope
    pub fn code(&self) -> i32 {
        match self {
            AppError::InvalidParam(_)
            | AppError::LimitExceeded { .. }
            | AppError::ChunkOutOfRange { .. }
            | AppError::ChecksumMismatch { .. }
            | AppError::IncompleteUpload { .. }
            | AppError::PayloadTooLarge
            | AppError::SessionNotFound(_) => CODE_INVALID,
            AppError::Unauthorized(_) => CODE_UNAUTHORIZED,
            AppError::RateLimited => CODE_TOO_MANY_REQUESTS,
            AppError::AssemblyFailed(_) | AppError::Io(_) => CODE_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= CODE_ERROR
    }
}

// transport status is always 200; callers branch on the envelope code
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        if self.is_server_error() {
            tracing::error!(code, "request failed: {}", self);
        } else {
            tracing::warn!(code, "request rejected: {}", self);
        }

        let mut response = (
            StatusCode::OK,
            Json(ApiResponse::<()>::error(code, self.to_string())),
        )
            .into_response();
        response.extensions_mut().insert(BusinessCode(code));
        response
    }
}

/// envelope code stashed on the response so the request logger can see it
#[derive(Debug, Clone, Copy)]
pub struct BusinessCode(pub i32);

pub type AppResult<T> = Result<T, AppError>;
