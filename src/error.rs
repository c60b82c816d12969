use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::FieldErrors;

/// Failures raised by a `Repository` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("User not found: id={0}")]
    UserNotFound(i64),

    #[error("Username already stored: {0}")]
    DuplicateUsername(String),
}

/// Failures raised by `UserService`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Username is already taken: {0}")]
    DuplicateUsername(String),

    /// Only the authentication lookup reports a miss as a failure; read paths return `None`.
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Bad credentials")]
    BadCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

/// ApiError
///
/// The handler-side error. Validation problems go back to the client field by field;
/// everything else is reduced to a status code and a generic message, with the detail only
/// logged.
#[derive(Debug)]
pub enum ApiError {
    Validation(FieldErrors),
    NotFound(String),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::DuplicateUsername(username) => ApiError::Validation(FieldErrors::single(
                "username",
                format!("User with username '{username}' already exists"),
            )),
            ServiceError::Store(StoreError::DuplicateUsername(username)) => {
                ApiError::Validation(FieldErrors::single(
                    "username",
                    format!("User with username '{username}' already exists"),
                ))
            }
            ServiceError::Store(StoreError::UserNotFound(id)) => {
                ApiError::NotFound(format!("user {id}"))
            }
            ServiceError::UserNotFound(username) => ApiError::NotFound(format!("user {username}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(errors)).into_response()
            }
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Not found: {what}") })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                tracing::error!("request failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
