//! Authentication Middleware
//! Mission: Resolve bearer access tokens to active users on protected routes

use crate::auth::{jwt::TokenError, jwt::TokenService, user_store::UserStore};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// State shared by the auth middleware layers
#[derive(Clone)]
pub struct AuthLayerState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<UserStore>,
}

/// Middleware that requires a valid bearer access token.
///
/// On success the resolved User is attached to request extensions so handlers
/// can take it via `Extension<User>`. No other side effects.
pub async fn auth_middleware(
    State(state): State<AuthLayerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;

    let user = resolve_user(&state, &token)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Pass-through variant: attaches the user when a valid token is present,
/// leaves the request anonymous otherwise
pub async fn optional_auth_middleware(
    State(state): State<AuthLayerState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        if let Ok(user) = resolve_user(&state, &token) {
            req.extensions_mut().insert(user);
        }
    }

    next.run(req).await
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

fn resolve_user(state: &AuthLayerState, token: &str) -> Result<crate::auth::models::User, AuthError> {
    let claims = state.tokens.decode_access(token).map_err(|e| match e {
        TokenError::Expired => AuthError::ExpiredToken,
        TokenError::Invalid => AuthError::InvalidToken,
    })?;

    // The subject must still resolve to an existing active user
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
    let user = state
        .users
        .get_by_id(&user_id)
        .map_err(|e| {
            tracing::error!("User lookup failed during auth: {}", e);
            AuthError::Internal
        })?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InvalidToken)?;

    Ok(user)
}

/// Auth error types
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
