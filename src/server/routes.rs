//! Router configuration for the HTTP API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Contribution ingestion
        .route("/api/materials", post(handlers::upload_material))
        // Credit ledger
        .route("/api/credits", get(handlers::get_credits))
        .route("/api/credits/deduct", post(handlers::deduct_credits))
        // Signed downloads
        .route("/api/files/download", get(handlers::issue_download_url))
        .route("/files/*key", get(handlers::serve_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
