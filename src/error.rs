// src/error.rs

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Global Application Error Enum.
/// Every failure that reaches a caller carries one of these kinds, never a raw internal error.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    // 404 Not Found
    #[error("Not found: {0}")]
    NotFound(String),

    // 403 Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // 409 Conflict: attempt lifecycle precondition violated (e.g. double submission)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // 400 Bad Request: attempt submitted after its time limit
    #[error("Attempt expired: {0}")]
    Expired(String),

    // 400 Bad Request
    #[error("Validation error: {0}")]
    ValidationError(String),

    // 500 Internal Server Error
    #[error("Repository error: {0}")]
    RepositoryError(String),

    // 401 Unauthorized
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // 409 Conflict (e.g., duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    // 500 Internal Server Error (hashing, token signing)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error kind sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Expired(_) => "ATTEMPT_EXPIRED",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::RepositoryError(_) => "REPOSITORY_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Expired(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::RepositoryError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::RepositoryError(msg) | AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::RepositoryError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Malformed or mistyped request bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_distinct_codes() {
        assert_eq!(AppError::InvalidState("x".into()).code(), "INVALID_STATE");
        assert_eq!(AppError::Expired("x".into()).code(), "ATTEMPT_EXPIRED");
        assert_eq!(
            AppError::InvalidState("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Expired("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn repository_error_hides_details_from_client() {
        let response = AppError::RepositoryError("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_messages() {
        let err = AppError::NotFound("quiz".into());
        assert_eq!(err.to_string(), "Not found: quiz");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
