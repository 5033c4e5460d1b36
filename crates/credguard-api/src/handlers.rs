use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::accounts::AccountError;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::*;
use crate::AppState;

fn issue_token(state: &AppState, email: &str) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.tokens.issue(email)?;
    Ok(Json(TokenResponse { token }))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 400, description = "Body is malformed JSON", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    // Without a JSON content type the body has no fields
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => Value::Object(Default::default()),
        Err(e) => return Err(ApiError::InvalidJson(e.body_text())),
    };

    let credential = state.accounts.register(&body).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserSummary {
            email: credential.email,
        }),
    ))
}

/// List registered users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Registered users, oldest first", body = [UserSummary]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    debug!("Listing users");

    let users = state
        .accounts
        .list()
        .await?
        .into_iter()
        .map(|c| UserSummary { email: c.email })
        .collect();

    Ok(Json(users))
}

/// Get the authenticated user
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = UserSummary),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserSummary>, ApiError> {
    let credential = state.accounts.find(&user.email).await?;

    Ok(Json(UserSummary {
        email: credential.email,
    }))
}

/// Delete the authenticated user's account
#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete(&user.email).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::MissingCredentials)?;

    let credential = state
        .accounts
        .authenticate(&request.email, &request.password)
        .await?;

    info!("User {} logged in", credential.id);
    issue_token(&state, &credential.email)
}

/// Exchange a valid token for a fresh one
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New token issued", body = TokenResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TokenResponse>, ApiError> {
    // A deleted account must not keep extending its sessions
    let credential = state
        .accounts
        .find(&user.email)
        .await
        .map_err(|e| match e {
            AccountError::NotFound => AccountError::InvalidCredentials,
            other => other,
        })?;

    issue_token(&state, &credential.email)
}

/// Demo protected resource
#[utoipa::path(
    get,
    path = "/api/protected",
    responses(
        (status = 200, description = "Protected data", body = ProtectedData),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn protected() -> Json<ProtectedData> {
    Json(ProtectedData {
        data: "Snoopy".to_string(),
    })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
