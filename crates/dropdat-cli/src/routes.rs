//! HTTP route definitions
//!
//! Requests for `/<key>/<path>` are handed to the handler registered for
//! `<key>` with the prefix stripped. Everything else is a 404.

use crate::{handlers, middleware, AppState};
use axum::{
    extract::{Request, State},
    http::{uri::PathAndQuery, StatusCode, Uri},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use dropdat_core::protocol::UPGRADE_PATH;
use dropdat_core::{decode, ArchiveKey, KEY_HEX_LEN};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();
    if state.config.allow_upgrade {
        router = router.route(UPGRADE_PATH, get(handlers::upgrade_session));
    }

    router
        .fallback(route_site)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Split `/<64 hex>/<rest>` into the key and `/<rest>`.
///
/// The key must be followed by a slash; `/<key>` alone does not match.
pub fn split_site_path(path: &str) -> Option<(ArchiveKey, &str)> {
    let rest = path.strip_prefix('/')?;
    let (segment, tail) = rest.split_at_checked(KEY_HEX_LEN)?;
    if !tail.starts_with('/') {
        return None;
    }
    let key = decode(segment).ok()?;
    Some((key, tail))
}

/// Same URI with its path replaced; the query is kept
fn rewrite_uri(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Dispatch a request to the site registered for its key
async fn route_site(State(state): State<Arc<AppState>>, mut request: Request) -> Response {
    let Some((key, rest)) = split_site_path(request.uri().path()) else {
        return not_found();
    };
    let Some(handler) = state.registry.lookup(&key) else {
        debug!(key = %key, "no site registered");
        return not_found();
    };
    let Some(uri) = rewrite_uri(request.uri(), rest) else {
        return not_found();
    };
    *request.uri_mut() = uri;

    match handler.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
