//! HTTP API for the study-material marketplace.
//!
//! Endpoints:
//! - `POST /api/materials` — ingest an encrypted contribution link
//! - `GET /api/credits` / `POST /api/credits/deduct` — credit balance
//! - `GET /api/files/download` — issue an expiring signed read URL
//! - `GET /files/*key` — serve a file against a valid signature
//! - `GET /health` — liveness probe
//!
//! Every `/api` route authenticates by the `x-user-id` header. There is
//! no session machinery here; the upstream gateway is trusted to have
//! resolved the user.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::repository::{JobQueue, MaterialRepository, ProfileRepository};
use crate::services::IngestService;
use crate::storage::BucketStore;

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<ProfileRepository>,
    pub queue: Arc<JobQueue>,
    pub store: Arc<BucketStore>,
    pub ingest: Arc<IngestService>,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        settings.ensure_dirs()?;

        let db_path = settings.db_path();
        let materials = Arc::new(MaterialRepository::new(&db_path)?);
        let profiles = Arc::new(ProfileRepository::new(&db_path)?);
        let queue = Arc::new(JobQueue::new(&db_path, settings.worker.max_attempts)?);
        let store = Arc::new(BucketStore::new(
            &settings.bucket_dir(),
            &settings.url_signing_secret,
        )?);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.server.fetch_timeout_secs))
            .build()?;

        let ingest = Arc::new(IngestService::new(
            materials,
            profiles.clone(),
            queue.clone(),
            http,
            settings.scratch_dir(),
            settings.link_passphrase.clone(),
        ));

        Ok(Self {
            profiles,
            queue,
            store,
            ingest,
        })
    }
}

/// Start the HTTP server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
