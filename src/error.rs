use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::repositories::session::StoreError;
use crate::services::account::BackendError;

/// The service's externally visible error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The account backend reports the user does not exist.
    #[error("user not found")]
    NotFound,

    /// The account backend reports the user already exists.
    #[error("user already exists")]
    AlreadyExists,

    /// No bearer credential was presented.
    #[error("missing credential")]
    MissingCredential,

    /// The credential is malformed, badly signed, of the wrong kind or expired.
    #[error("invalid credential")]
    InvalidCredential,

    /// The credential is well-formed but no longer matches the stored session.
    #[error("revoked credential")]
    Revoked,

    /// A backing service is unavailable or timed out. Retryable.
    #[error("service temporarily unavailable: {0}")]
    Transient(String),

    /// The account backend returned an outcome code with no known mapping.
    #[error("unhandled backend error (code {0})")]
    Unhandled(i32),

    /// A malformed request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyExists => StatusCode::CONFLICT,
            AppError::MissingCredential | AppError::InvalidCredential | AppError::Revoked => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unhandled(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Transient(err.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        if err.is_retryable() {
            AppError::Transient(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::NotFound | AppError::AlreadyExists => {
                tracing::debug!("Account error: {}", self);
                self.to_string()
            }

            AppError::MissingCredential | AppError::InvalidCredential | AppError::Revoked => {
                tracing::warn!("Authentication failed: {}", self);
                self.to_string()
            }

            AppError::Transient(ref detail) => {
                tracing::error!("Transient failure: {}", detail);
                "service temporarily unavailable".to_string()
            }

            AppError::Unhandled(code) => {
                tracing::error!("Unhandled backend error code: {}", code);
                "unhandled backend error".to_string()
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "internal server error".to_string()
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
