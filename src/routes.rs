//! Router Assembly
//! Mission: Wire public, protected, and location routes with shared layers

use crate::auth::{
    api as auth_api, auth_middleware, optional_auth_middleware, AuthLayerState, AuthState,
};
use crate::location::{api as location_api, LocationState};
use crate::middleware::request_logging;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

/// Build the full application router
pub fn create_router(auth_state: AuthState, location_state: LocationState) -> Router {
    let auth_layer_state = AuthLayerState {
        tokens: auth_state.tokens.clone(),
        users: auth_state.users.clone(),
    };

    // Public user routes: registration and the token lifecycle. The
    // published interface uses trailing slashes, so both forms are
    // registered as first-class routes rather than redirects.
    let user_routes = Router::new()
        .route("/user/create", post(auth_api::register))
        .route("/user/create/", post(auth_api::register))
        .route("/user/token", post(auth_api::obtain_token))
        .route("/user/token/", post(auth_api::obtain_token))
        .route("/user/token/refresh", post(auth_api::refresh_token))
        .route("/user/token/refresh/", post(auth_api::refresh_token))
        .with_state(auth_state.clone());

    // Profile routes require a bearer access token; unmatched methods on
    // /user/me fall through to axum's 405
    let profile_routes = Router::new()
        .route("/user/me", get(auth_api::me).patch(auth_api::update_me))
        .route("/user/me/", get(auth_api::me).patch(auth_api::update_me))
        .route_layer(from_fn_with_state(
            auth_layer_state.clone(),
            auth_middleware,
        ))
        .with_state(auth_state);

    // Location reads are public; optional auth attaches an identity when a
    // valid token is present but never rejects
    let location_routes = Router::new()
        .route("/location/caverns", get(location_api::list_caverns))
        .route("/location/caverns/", get(location_api::list_caverns))
        .route("/location/caverns/:id", get(location_api::get_cavern))
        .route("/location/caverns/:id/", get(location_api::get_cavern))
        .route("/location/links", get(location_api::list_links))
        .route("/location/links/", get(location_api::list_links))
        .route("/location/links/:id", get(location_api::get_link))
        .route("/location/links/:id/", get(location_api::get_link))
        .route_layer(from_fn_with_state(
            auth_layer_state,
            optional_auth_middleware,
        ))
        .with_state(location_state);

    Router::new()
        .route("/health", get(health_check))
        .merge(user_routes)
        .merge(profile_routes)
        .merge(location_routes)
        .layer(from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
