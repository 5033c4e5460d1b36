//! Bearer token authentication middleware
//!
//! Extracts the session token from the `Authorization` header, verifies
//! it, and makes the identity available to handlers via Axum's Extension.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use credguard_auth::SessionTokens;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::models::ErrorResponse;

/// Authenticated identity extracted from the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub email: String,
}

/// Token verification state shared across middleware instances
#[derive(Clone)]
pub struct SessionState {
    pub tokens: Arc<SessionTokens>,
}

impl SessionState {
    pub fn new(tokens: Arc<SessionTokens>) -> Self {
        Self { tokens }
    }
}

fn unauthorized(error: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(error, code)))
}

/// Authentication middleware that validates session tokens
///
/// # Errors
/// Returns 401 Unauthorized if:
/// - The Authorization header is missing
/// - The header is not of the form `Bearer <token>`
/// - The token is malformed, badly signed or expired
///
/// Token failures share one response body; the specific reason is only
/// logged.
pub async fn require_auth(
    State(state): State<Arc<SessionState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header", "MISSING_AUTH"))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        unauthorized(
            "Invalid Authorization header format. Expected 'Bearer <token>'",
            "INVALID_AUTH_FORMAT",
        )
    })?;

    let email = state.tokens.verify(token.trim()).map_err(|e| {
        debug!("Rejected session token: {}", e);
        unauthorized("Invalid or expired token", "INVALID_TOKEN")
    })?;

    request.extensions_mut().insert(AuthUser { email });

    Ok(next.run(request).await)
}
