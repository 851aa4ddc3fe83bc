//! Request logging middleware shared by the producer, orchestrator, and
//! facilitator HTTP servers. Logs method, path, status, and latency per request.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn, Span};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );
    let _guard = span.enter();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    Span::current().record("status", status);
    Span::current().record("latency_ms", latency.as_millis() as u64);

    if status >= 500 {
        warn!(method = %method, path = %path, status, latency_ms = latency.as_millis(), "request failed (5xx)");
    } else if status >= 400 {
        info!(method = %method, path = %path, status, latency_ms = latency.as_millis(), "request completed (4xx)");
    } else {
        info!(method = %method, path = %path, status, latency_ms = latency.as_millis(), "request completed");
    }

    response
}
