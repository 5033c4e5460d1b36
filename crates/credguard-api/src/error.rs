//! Mapping of service errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use credguard_auth::{SessionError, ValidationError};
use tracing::error;

use crate::accounts::AccountError;
use crate::models::{ErrorResponse, ValidationErrorResponse};

#[derive(Debug)]
pub enum ApiError {
    Account(AccountError),
    /// Request body was not JSON
    InvalidJson(String),
    /// Login body lacked string `email`/`password`
    MissingCredentials,
    /// Token could not be signed
    Session(SessionError),
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        ApiError::Account(e)
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::Session(e)
    }
}

impl From<ValidationError> for ValidationErrorResponse {
    fn from(e: ValidationError) -> Self {
        Self {
            reason: "ValidationError".to_string(),
            message: e.message(),
            location: e.location.to_string(),
        }
    }
}

pub(crate) fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error", "INTERNAL_ERROR")),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Account(AccountError::Validation(e)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse::from(e)),
            )
                .into_response(),
            ApiError::Account(AccountError::InvalidCredentials) => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "Invalid email or password",
                    "INVALID_CREDENTIALS",
                )),
            )
                .into_response(),
            ApiError::Account(AccountError::NotFound) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("User not found", "USER_NOT_FOUND")),
            )
                .into_response(),
            ApiError::Account(e) => {
                error!("Failed to handle account request: {}", e);
                internal_error()
            }
            ApiError::InvalidJson(detail) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    format!("Invalid JSON body: {}", detail),
                    "INVALID_JSON",
                )),
            )
                .into_response(),
            ApiError::MissingCredentials => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Request must include string 'email' and 'password' fields",
                    "MISSING_CREDENTIALS",
                )),
            )
                .into_response(),
            ApiError::Session(e) => {
                error!("Failed to issue session token: {}", e);
                internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credguard_auth::{Field, ValidationErrorKind};
    use credguard_db::{DbErr, StoreError};

    #[test]
    fn test_validation_error_body() {
        let body = ValidationErrorResponse::from(ValidationError::new(
            ValidationErrorKind::TooShort { min: 10 },
            Field::Password,
        ));
        assert_eq!(body.reason, "ValidationError");
        assert_eq!(body.message, "Must be at least 10 characters long");
        assert_eq!(body.location, "password");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::from(AccountError::Validation(ValidationError::email_taken())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(AccountError::InvalidCredentials),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::from(AccountError::NotFound), StatusCode::NOT_FOUND),
            (
                ApiError::from(AccountError::Store(StoreError::Database(DbErr::Custom(
                    "connection reset".to_string(),
                )))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::MissingCredentials, StatusCode::BAD_REQUEST),
            (
                ApiError::from(SessionError::EmptySecret),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
