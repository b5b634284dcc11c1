//! Location API Endpoints
//! Mission: Paginated read-only access to caverns and links

use crate::location::{
    models::{Cavern, Link},
    store::{LocationStore, Page},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_PAGE_LIMIT: u32 = 50;
const MAX_PAGE_LIMIT: u32 = 500;

/// Shared location state
#[derive(Clone)]
pub struct LocationState {
    pub store: Arc<LocationStore>,
}

// ===== Route Handlers =====

/// List caverns - GET /location/caverns
pub async fn list_caverns(
    State(state): State<LocationState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse<Cavern>>, ApiError> {
    let (count, results) = state.store.list_caverns(params.found, params.page())?;
    Ok(Json(ListResponse { count, results }))
}

/// Retrieve one cavern - GET /location/caverns/:id
pub async fn get_cavern(
    State(state): State<LocationState>,
    Path(id): Path<i64>,
) -> Result<Json<Cavern>, ApiError> {
    state
        .store
        .get_cavern(id)?
        .map(Json)
        .ok_or(ApiError::NotFound(format!("Cavern {} not found", id)))
}

/// List links - GET /location/links
pub async fn list_links(
    State(state): State<LocationState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse<Link>>, ApiError> {
    let (count, results) = state.store.list_links(params.found, params.page())?;
    Ok(Json(ListResponse { count, results }))
}

/// Retrieve one link - GET /location/links/:id
pub async fn get_link(
    State(state): State<LocationState>,
    Path(id): Path<i64>,
) -> Result<Json<Link>, ApiError> {
    state
        .store
        .get_link(id)?
        .map(Json)
        .ok_or(ApiError::NotFound(format!("Link {} not found", id)))
}

// ===== Request/Response Types =====

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Page size (default 50, capped at 500)
    limit: Option<u32>,
    /// Rows to skip before the page starts
    offset: Option<u32>,
    /// Opt-in found filter; listing is unfiltered when absent
    found: Option<bool>,
}

impl ListQuery {
    fn page(&self) -> Page {
        Page {
            limit: self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT) as i64,
            offset: self.offset.unwrap_or(0) as i64,
        }
    }
}

/// List envelope; count is the total matching rows, not the page size
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub count: i64,
    pub results: Vec<T>,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Database(anyhow::Error),
    NotFound(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
