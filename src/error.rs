//! Error types for the library lending service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes surfaced alongside HTTP statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    DbFailure = 2,
    NoSuchRecord = 3,
    BadValue = 4,
    NotAvailable = 5,
    MemberIneligible = 6,
    BorrowingLimitExceeded = 7,
    RenewalLimitExceeded = 8,
    AlreadyReturned = 9,
    InvalidStateTransition = 10,
    AlreadyMember = 11,
    Duplicate = 12,
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

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("No copy available: {0}")]
    NotAvailable(String),

    #[error("Member ineligible: {0}")]
    MemberIneligible(String),

    #[error("Borrowing limit exceeded ({current}/{limit})")]
    BorrowingLimitExceeded { current: i64, limit: i32 },

    #[error("Renewal limit exceeded ({count}/{max})")]
    RenewalLimitExceeded { count: i16, max: i16 },

    #[error("Loan already returned: {0}")]
    AlreadyReturned(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Already an active member: {0}")]
    AlreadyMember(String),
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
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord, msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::NotAvailable(msg) => {
                (StatusCode::CONFLICT, ErrorCode::NotAvailable, msg.clone())
            }
            AppError::MemberIneligible(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::MemberIneligible,
                msg.clone(),
            ),
            AppError::BorrowingLimitExceeded { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::BorrowingLimitExceeded,
                self.to_string(),
            ),
            AppError::RenewalLimitExceeded { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::RenewalLimitExceeded,
                self.to_string(),
            ),
            AppError::AlreadyReturned(msg) => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyReturned, msg.clone())
            }
            AppError::InvalidStateTransition(msg) => (
                StatusCode::CONFLICT,
                ErrorCode::InvalidStateTransition,
                msg.clone(),
            ),
            AppError::AlreadyMember(msg) => {
                (StatusCode::CONFLICT, ErrorCode::AlreadyMember, msg.clone())
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
