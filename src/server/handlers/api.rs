//! JSON API handlers.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::super::AppState;
use crate::config::DEFAULT_SIGNED_URL_MINUTES;
use crate::metadata::StructuredMetadata;
use crate::repository::RepositoryError;
use crate::services::IngestError;

/// Largest credit amount a single deduction may move.
const MAX_DEDUCT_AMOUNT: i64 = 10_000;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Uniform error body: `{"error": ...}`.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Resolve the caller from the `x-user-id` header.
fn require_user(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "authentication required"))
}

fn status_for(error: &IngestError) -> StatusCode {
    match error {
        IngestError::InvalidMetadata(_) | IngestError::PageCount(_) => StatusCode::BAD_REQUEST,
        IngestError::Duplicate => StatusCode::CONFLICT,
        IngestError::Fetch(_)
        | IngestError::Persistence(_)
        | IngestError::Queue(_)
        | IngestError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Ingest one encrypted contribution link.
///
/// The body is taken as a raw JSON value so that a missing or malformed
/// field reads as a 400 with a message instead of an extractor reject.
pub async fn upload_material(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let code = match body.get("code").and_then(|v| v.as_str()) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "code is required"),
    };

    let metadata: StructuredMetadata = match body
        .get("metadata")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(metadata)) => metadata,
        Some(Err(_)) => return error_response(StatusCode::BAD_REQUEST, "metadata is malformed"),
        None => return error_response(StatusCode::BAD_REQUEST, "metadata is required"),
    };

    match state.ingest.ingest(&user_id, &code, metadata).await {
        Ok(outcome) => Json(serde_json::json!({
            "success": true,
            "message": "Upload successful",
            "metadata": outcome.metadata,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(user = %user_id, "upload rejected: {e}");
            error_response(status_for(&e), &e.to_string())
        }
    }
}

/// Current credit balance for the caller. Unknown profiles read as zero.
pub async fn get_credits(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.profiles.get_credits(&user_id) {
        Ok(credits) => Json(serde_json::json!({
            "userId": user_id,
            "credits": credits.unwrap_or(0),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("credit lookup failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "credit lookup failed")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeductRequest {
    pub amount: Option<i64>,
}

/// Spend credits, e.g. to unlock a download.
pub async fn deduct_credits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeductRequest>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let amount = match request.amount {
        Some(amount) if (1..=MAX_DEDUCT_AMOUNT).contains(&amount) => amount,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "amount must be between 1 and 10000",
            )
        }
    };

    match state.profiles.deduct_credits(&user_id, amount) {
        Ok(remaining) => Json(serde_json::json!({
            "success": true,
            "credits": remaining,
        }))
        .into_response(),
        Err(RepositoryError::ProfileNotFound) => {
            error_response(StatusCode::NOT_FOUND, "profile not found")
        }
        Err(RepositoryError::InsufficientCredits) => {
            error_response(StatusCode::BAD_REQUEST, "insufficient credits")
        }
        Err(e) => {
            tracing::error!("credit deduction failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "credit deduction failed")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub key: Option<String>,
    pub filename: Option<String>,
    pub minutes: Option<u32>,
}

/// Issue an expiring signed URL for a stored object.
pub async fn issue_download_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DownloadParams>,
) -> Response {
    if let Err(response) = require_user(&headers) {
        return response;
    }

    let key = match params.key.as_deref().map(|k| k.trim_start_matches('/')) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "key is required"),
    };

    if !state.store.exists(&key) {
        return error_response(StatusCode::NOT_FOUND, "file not found");
    }

    let minutes = params.minutes.unwrap_or(DEFAULT_SIGNED_URL_MINUTES);
    match state
        .store
        .signed_read_url(&key, minutes, params.filename.as_deref())
    {
        Ok(signed) => Json(serde_json::json!({
            "url": signed.url,
            "expires": signed.expires,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("could not sign URL for {key}: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not sign URL")
        }
    }
}
