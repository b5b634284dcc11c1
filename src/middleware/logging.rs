//! Request Logging
//! Mission: One structured line per request, graded by outcome class

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Log method, path, status, and latency for every request.
///
/// Outcomes are graded by status class: 5xx at WARN, 4xx at INFO as
/// "rejected" (invalid credentials and expired tokens are routine on an
/// auth surface, not server trouble), everything else at INFO as
/// "completed". `/health` is skipped so liveness polling stays out of the
/// logs.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;

    match status {
        s if s >= 500 => warn!(%method, %path, status, latency_ms, "Request errored"),
        s if s >= 400 => info!(%method, %path, status, latency_ms, "Request rejected"),
        _ => info!(%method, %path, status, latency_ms, "Request completed"),
    }

    response
}
