//! Tracing setup and per-request summaries
//!
//! Session and stream lifecycle events are logged where they happen
//! (`http::sse`, `session`, `http::streamable`); this module only covers the
//! subscriber and the HTTP edge.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

/// One summary line per request. For event streams `duration_ms` is the time
/// to first byte; the stream itself outlives this middleware.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let streaming = is_event_stream(response.headers());

    info!(
        method = %method,
        path = %path,
        status,
        streaming,
        duration_ms = started_at.elapsed().as_millis(),
        "request summary"
    );

    if response.status().is_client_error() || response.status().is_server_error() {
        warn!(method = %method, path = %path, status, "request rejected");
    }

    response
}
