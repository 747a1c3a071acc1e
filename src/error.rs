//! Error types for the library loans server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned in API error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    StorageFailure = 2,
    NoSuchData = 3,
    CopyNotAvailable = 4,
    BadValue = 5,
    ChannelFailure = 6,
    MailFailure = 7,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Event channel error: {0}")]
    Channel(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Infrastructure failures that may succeed when the same work is retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Channel(_) | AppError::Mail(_) | AppError::Timeout(_)
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::StorageFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::CopyNotAvailable, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Channel(e) => {
                tracing::error!("Event channel error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorCode::ChannelFailure,
                    "Event channel error".to_string(),
                )
            }
            AppError::Mail(msg) => {
                tracing::error!("Mail error: {}", msg);
                (StatusCode::BAD_GATEWAY, ErrorCode::MailFailure, "Mail error".to_string())
            }
            AppError::Timeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, ErrorCode::Failure, msg.clone())
            }
            AppError::Serialization(_) | AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
