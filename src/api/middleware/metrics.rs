use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Collapses per-file path segments so each route logs under one name.
fn route_label(path: &str) -> &str {
    if path.starts_with("/remove/") {
        "/remove/{id}"
    } else if path.starts_with("/swagger-ui") || path.starts_with("/api-docs") {
        "/swagger-ui"
    } else {
        path
    }
}

/// Emits one `metrics` event per request with route, status and latency.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let route = route_label(req.uri().path()).to_string();

    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if route == "/health" {
        tracing::debug!(target: "metrics", method = %method, route = %route, status, latency_ms, "request_completed");
    } else {
        tracing::info!(target: "metrics", method = %method, route = %route, status, latency_ms, "request_completed");
    }

    response
}
