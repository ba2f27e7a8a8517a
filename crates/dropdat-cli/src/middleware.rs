//! HTTP middleware

use crate::routes::split_site_path;
use axum::{body::Body, http::Request, middleware::Next, response::Response};

/// Logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let site = split_site_path(uri.path()).map(|(key, _)| key.to_hex());
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        site = site.as_deref().unwrap_or("-"),
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}
