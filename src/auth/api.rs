//! Authentication API Endpoints
//! Mission: Registration, token obtain/refresh, and profile management

use crate::auth::{
    jwt::{TokenError, TokenService},
    models::{
        ProfileResponse, RefreshRequest, RegisterRequest, TokenPair, TokenRequest,
        UpdateProfileRequest, User, UserResponse,
    },
    refresh_store::RefreshTokenStore,
    user_store::{StoreError, UserStore},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<UserStore>,
    pub consumed: Arc<RefreshTokenStore>,
    pub tokens: Arc<TokenService>,
}

impl AuthState {
    pub fn new(
        users: Arc<UserStore>,
        consumed: Arc<RefreshTokenStore>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            users,
            consumed,
            tokens,
        }
    }
}

/// Register a new user - POST /user/create
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthApiError> {
    let user = state
        .users
        .create_user(&payload.email, &payload.password, &payload.name)?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Obtain a token pair for valid credentials - POST /user/token
pub async fn obtain_token(
    State(state): State<AuthState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenPair>, AuthApiError> {
    if payload.email.trim().is_empty() {
        return Err(AuthApiError::Validation("Email must not be blank".into()));
    }
    if payload.password.is_empty() {
        return Err(AuthApiError::Validation(
            "Password must not be blank".into(),
        ));
    }

    let user = state
        .users
        .verify_credentials(&payload.email, &payload.password)?
        .ok_or_else(|| {
            warn!("Failed login attempt for {}", payload.email);
            AuthApiError::InvalidCredentials
        })?;

    let pair = state
        .tokens
        .issue_pair(&user)
        .map_err(AuthApiError::Internal)?;

    info!("Issued token pair for {}", user.email);

    Ok(Json(pair))
}

/// Exchange a refresh token for a new pair - POST /user/token/refresh
///
/// The presented token is verified first (an expired-and-consumed token
/// reports expiry), then atomically consumed; only after the Issued ->
/// Consumed transition succeeds is a new pair minted, so no partial rotation
/// can occur.
pub async fn refresh_token(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthApiError> {
    if payload.refresh.trim().is_empty() {
        return Err(AuthApiError::Validation(
            "Refresh token must not be blank".into(),
        ));
    }

    let claims = state
        .tokens
        .decode_refresh(&payload.refresh)
        .map_err(|e| match e {
            TokenError::Expired => AuthApiError::TokenExpired,
            TokenError::Invalid => AuthApiError::TokenInvalid,
        })?;

    // The subject must still be an existing active user
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthApiError::TokenInvalid)?;
    let user = state
        .users
        .get_by_id(&user_id)?
        .filter(|u| u.is_active)
        .ok_or(AuthApiError::TokenInvalid)?;

    // Atomic single-use check: at most one exchange ever succeeds per jti
    let consumed = state
        .consumed
        .consume(&claims.jti, &claims.sub)
        .map_err(AuthApiError::Internal)?;
    if !consumed {
        warn!("Refresh token reuse rejected for user {}", user.email);
        return Err(AuthApiError::TokenReused);
    }

    let pair = state
        .tokens
        .issue_pair(&user)
        .map_err(AuthApiError::Internal)?;

    Ok(Json(pair))
}

/// Current user's profile - GET /user/me
pub async fn me(Extension(user): Extension<User>) -> Json<ProfileResponse> {
    Json(ProfileResponse::from_user(&user))
}

/// Update the current user's profile - PATCH /user/me
pub async fn update_me(
    State(state): State<AuthState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AuthApiError> {
    let updated = state.users.update_profile(&user.id, &payload)?;

    Ok(Json(ProfileResponse::from_user(&updated)))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    Validation(String),
    InvalidCredentials,
    TokenInvalid,
    TokenExpired,
    TokenReused,
    NotFound,
    Internal(anyhow::Error),
}

impl From<StoreError> for AuthApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => AuthApiError::Validation(msg),
            StoreError::NotFound => AuthApiError::NotFound,
            StoreError::Database(e) => AuthApiError::Internal(e),
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password".into())
            }
            AuthApiError::TokenInvalid => (StatusCode::UNAUTHORIZED, "Invalid token".into()),
            AuthApiError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired".into()),
            AuthApiError::TokenReused => (
                StatusCode::UNAUTHORIZED,
                "Refresh token has already been used".into(),
            ),
            AuthApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".into()),
            AuthApiError::Internal(err) => {
                tracing::error!("Auth API internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
