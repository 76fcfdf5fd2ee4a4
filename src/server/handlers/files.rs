//! Signed file serving.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::super::AppState;

#[derive(Debug, Deserialize)]
pub struct ServeParams {
    pub expires: Option<i64>,
    pub sig: Option<String>,
    pub filename: Option<String>,
}

/// Serve a bucket object against a valid signed URL.
///
/// An absent or stale signature is 403 regardless of whether the object
/// exists, so unauthenticated callers cannot probe the bucket.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ServeParams>,
) -> Response {
    let key = key.trim_start_matches('/');

    let verified = match (params.expires, params.sig.as_deref()) {
        (Some(expires), Some(sig)) => state.store.verify_read(key, expires, sig),
        _ => false,
    };
    if !verified {
        return StatusCode::FORBIDDEN.into_response();
    }

    let path = match state.store.object_path(key) {
        Ok(path) => path,
        Err(_) => return StatusCode::FORBIDDEN.into_response(),
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::error!("could not read {}: {}", path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = ([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response();
    if let Some(filename) = params.filename.as_deref() {
        let value = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
        if let Ok(value) = header::HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}
