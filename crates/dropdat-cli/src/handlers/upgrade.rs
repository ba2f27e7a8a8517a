//! Upload sessions tunnelled through the HTTP listener

use crate::{session, AppState};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use dropdat_core::protocol::UPGRADE_PROTOCOL;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tracing::warn;

fn wants_upgrade(headers: &HeaderMap) -> bool {
    let upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(UPGRADE_PROTOCOL));
    let connection = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("upgrade")));
    upgrade && connection
}

/// `GET /upload` with `Upgrade: drop-dat`: switch protocols and run an
/// upload session over the upgraded connection
pub async fn upgrade_session(State(state): State<Arc<AppState>>, mut request: Request) -> Response {
    if !wants_upgrade(request.headers()) {
        return (
            StatusCode::UPGRADE_REQUIRED,
            [(header::UPGRADE, UPGRADE_PROTOCOL)],
            "upload sessions require Upgrade: drop-dat",
        )
            .into_response();
    }

    let on_upgrade = hyper::upgrade::on(&mut request);
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                session::spawn_session(TokioIo::new(upgraded), "http-upgrade".to_string(), state);
            }
            Err(e) => warn!(error = %e, "upgrade failed"),
        }
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, UPGRADE_PROTOCOL)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
