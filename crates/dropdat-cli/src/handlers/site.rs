//! Per-archive HTTP handler
//!
//! Serves the files of one archive. The gateway router strips the
//! `/<key>` prefix before requests get here, so paths are archive paths.

use crate::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use dropdat_core::{normalize_path, ArchiveRef, DirEntry, EntryKind};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Header carrying the archive key
pub const ARCHIVE_KEY_HEADER: &str = "archive-key";

/// Header carrying the archive version
pub const ARCHIVE_VERSION_HEADER: &str = "archive-version";

/// How archives are presented over HTTP
#[derive(Clone, Debug, Default)]
pub struct SiteOptions {
    /// Add archive key/version headers and expose them cross-origin
    pub expose_headers: bool,
    /// Content may change at any time; disable caching
    pub live: bool,
    /// HTML appended to directory listings
    pub footer: Option<String>,
}

struct Site {
    archive: ArchiveRef,
    options: SiteOptions,
}

/// Build the handler serving `archive`
pub fn site_router(archive: ArchiveRef, options: SiteOptions) -> Router {
    let expose = options.expose_headers;
    let router = Router::new()
        .fallback(serve_entry)
        .with_state(Arc::new(Site { archive, options }));

    if expose {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD])
            .expose_headers([
                header::HeaderName::from_static(ARCHIVE_KEY_HEADER),
                header::HeaderName::from_static(ARCHIVE_VERSION_HEADER),
            ]);
        router.layer(cors)
    } else {
        router
    }
}

async fn serve_entry(
    State(site): State<Arc<Site>>,
    method: Method,
    uri: Uri,
) -> Result<Response, ApiError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::MethodNotAllowed);
    }

    let raw_path = urlencoding::decode(uri.path())
        .map_err(|_| ApiError::BadRequest("path is not valid UTF-8".to_string()))?;
    let path = normalize_path(&raw_path)?;

    let mut response = match site.archive.stat(&path).await? {
        EntryKind::File { .. } => file_response(&path, site.archive.read_file(&path).await?),
        EntryKind::Directory if !raw_path.ends_with('/') => redirect_to_dir(&raw_path),
        EntryKind::Directory => {
            let index = join(&path, "index.html");
            match site.archive.read_file(&index).await {
                Ok(data) => file_response(&index, data),
                Err(e) if e.is_not_found() => {
                    let entries = site.archive.list(&path).await?;
                    Html(render_listing(&path, &entries, site.options.footer.as_deref()))
                        .into_response()
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    decorate(&mut response, &site);
    Ok(response)
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn file_response(path: &str, data: Bytes) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Relative redirect, so it resolves under whatever prefix the client used
fn redirect_to_dir(raw_path: &str) -> Response {
    let last = raw_path.rsplit('/').next().unwrap_or_default();
    let location = format!("{}/", urlencoding::encode(last));
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

fn decorate(response: &mut Response, site: &Site) {
    let headers = response.headers_mut();
    if site.options.expose_headers {
        if let Ok(value) = HeaderValue::from_str(&site.archive.key().to_hex()) {
            headers.insert(ARCHIVE_KEY_HEADER, value);
        }
        headers.insert(ARCHIVE_VERSION_HEADER, HeaderValue::from(site.archive.version()));
    }
    if site.options.live {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_listing(path: &str, entries: &[DirEntry], footer: Option<&str>) -> String {
    let title = escape_html(&format!("/{}", path));
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    if !path.is_empty() {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for entry in entries {
        let suffix = if entry.is_dir() { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{}{}\">{}{}</a></li>\n",
            urlencoding::encode(&entry.name),
            suffix,
            escape_html(&entry.name),
            suffix
        ));
    }
    html.push_str("</ul>\n");
    if let Some(footer) = footer {
        html.push_str(footer);
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}
