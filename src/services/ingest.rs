//! Ingestion pipeline: decode, fetch, hash, dedupe, route, reward, enqueue.
//!
//! Steps run strictly in order; the first failure short-circuits the
//! rest. Nothing downstream of a failed step executes, so a fetch
//! failure leaves no material row, no credit change and no queued job.
//! The duplicate pre-check by hash is only an optimization - the unique
//! constraint on the material insert is the authoritative guard under
//! concurrency.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::crypto::decrypt_link;
use crate::fetch::{fetch_to_file, FetchError};
use crate::hashing::hash_file;
use crate::metadata::{MetadataError, StructuredMetadata};
use crate::models::{JobKind, ProcessJob};
use crate::pdf::{count_pages, PdfError};
use crate::repository::{JobQueue, MaterialRepository, ProfileRepository, RepositoryError};

/// Credit reward and job kind chosen from the page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub reward: i64,
    pub kind: JobKind,
}

impl RouteDecision {
    /// Fixed routing thresholds.
    ///
    /// Documents of ten or more pages go through the repair pipeline;
    /// everything shorter is uploaded as-is with a smaller reward.
    pub fn for_page_count(pages: usize) -> Self {
        if pages <= 1 {
            Self {
                reward: 2,
                kind: JobKind::UploadPdf,
            }
        } else if pages < 10 {
            Self {
                reward: 5,
                kind: JobKind::UploadPdf,
            }
        } else {
            Self {
                reward: 10,
                kind: JobKind::ProcessPdf,
            }
        }
    }
}

/// Ingestion failure taxonomy.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidMetadata(#[from] MetadataError),
    /// Download failed. The user-facing message stays generic so the
    /// decrypted source URL never leaks.
    #[error("{}", crate::fetch::INVALID_CODE_MESSAGE)]
    Fetch(#[from] FetchError),
    #[error("not a valid PDF document")]
    PageCount(#[from] PdfError),
    #[error("this file already exists")]
    Duplicate,
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("could not queue processing job: {0}")]
    Queue(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RepositoryError> for IngestError {
    fn from(e: RepositoryError) -> Self {
        if e.is_duplicate() {
            IngestError::Duplicate
        } else {
            IngestError::Persistence(e.to_string())
        }
    }
}

/// Successful ingestion summary. The storage destination is deliberately
/// absent - callers do not learn the final location synchronously.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub metadata: StructuredMetadata,
    pub pages: usize,
    pub reward: i64,
    pub kind: JobKind,
    pub material_id: String,
}

/// Orchestrates one ingestion request end to end.
pub struct IngestService {
    materials: Arc<MaterialRepository>,
    profiles: Arc<ProfileRepository>,
    queue: Arc<JobQueue>,
    http: reqwest::Client,
    scratch_dir: PathBuf,
    link_passphrase: String,
}

impl IngestService {
    pub fn new(
        materials: Arc<MaterialRepository>,
        profiles: Arc<ProfileRepository>,
        queue: Arc<JobQueue>,
        http: reqwest::Client,
        scratch_dir: PathBuf,
        link_passphrase: String,
    ) -> Self {
        Self {
            materials,
            profiles,
            queue,
            http,
            scratch_dir,
            link_passphrase,
        }
    }

    /// Run the pipeline for one authenticated caller.
    pub async fn ingest(
        &self,
        user_id: &str,
        code: &str,
        metadata: StructuredMetadata,
    ) -> Result<IngestOutcome, IngestError> {
        metadata.validate()?;

        // An empty decrypt result flows into the fetch, which fails with
        // the same generic message as any other bad link.
        let link = decrypt_link(code, &self.link_passphrase);

        // Unique per-request scratch path: concurrent ingestions by the
        // same caller must not clobber each other's download.
        let scratch = self
            .scratch_dir
            .join(format!("{user_id}-{}.pdf", uuid::Uuid::new_v4()));

        let fetched = fetch_to_file(&self.http, &link, &scratch).await?;
        tracing::debug!(
            user = user_id,
            bytes = fetched.bytes,
            "downloaded contribution to scratch"
        );

        let content_hash = hash_file(&scratch)?;

        if self.materials.find_by_hash(&content_hash)?.is_some() {
            self.discard_scratch(&scratch).await;
            return Err(IngestError::Duplicate);
        }

        let pages = match count_pages(&scratch) {
            Ok(pages) => pages,
            Err(e) => {
                self.discard_scratch(&scratch).await;
                return Err(e.into());
            }
        };

        let record = match self.materials.insert(user_id, &content_hash, &metadata) {
            Ok(record) => record,
            Err(e) => {
                self.discard_scratch(&scratch).await;
                return Err(e.into());
            }
        };

        let route = RouteDecision::for_page_count(pages);
        if let Err(e) = self.profiles.add_credits(user_id, route.reward) {
            self.discard_scratch(&scratch).await;
            return Err(IngestError::Persistence(e.to_string()));
        }

        let job = ProcessJob {
            filepath: scratch,
            destination: metadata.object_key(),
            metadata: metadata.clone(),
        };
        let job_id = match self.queue.enqueue(route.kind, &job) {
            Ok(job_id) => job_id,
            Err(e) => {
                self.discard_scratch(&job.filepath).await;
                return Err(IngestError::Queue(e.to_string()));
            }
        };

        tracing::info!(
            user = user_id,
            material = %record.id,
            job = job_id,
            pages,
            reward = route.reward,
            kind = route.kind.as_str(),
            "material accepted"
        );

        Ok(IngestOutcome {
            metadata,
            pages,
            reward: route.reward,
            kind: route.kind,
            material_id: record.id,
        })
    }

    /// Remove a scratch file no queued job will ever consume.
    async fn discard_scratch(&self, path: &std::path::Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("could not remove scratch file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::JobStatus;
    use crate::pdf::test_support::build_pdf;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;

    const PASSPHRASE: &str = "test-passphrase";

    fn metadata() -> StructuredMetadata {
        StructuredMetadata {
            semester: "sem-3".to_string(),
            branch: "cse".to_string(),
            subject: "dbms".to_string(),
            paper_type: "question-paper".to_string(),
            solve_type: None,
            unit_or_year: None,
        }
    }

    struct Fixture {
        service: IngestService,
        materials: Arc<MaterialRepository>,
        profiles: Arc<ProfileRepository>,
        queue: Arc<JobQueue>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let materials = Arc::new(MaterialRepository::new(&db_path).unwrap());
        let profiles = Arc::new(ProfileRepository::new(&db_path).unwrap());
        let queue = Arc::new(JobQueue::new(&db_path, 2).unwrap());

        let service = IngestService::new(
            materials.clone(),
            profiles.clone(),
            queue.clone(),
            reqwest::Client::new(),
            dir.path().join("scratch"),
            PASSPHRASE.to_string(),
        );

        Fixture {
            service,
            materials,
            profiles,
            queue,
            _dir: dir,
        }
    }

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn upstream_serving_pdf(pages: usize) -> SocketAddr {
        let body = build_pdf(pages);
        let app = Router::new().route("/doc.pdf", get(move || async move { body.clone() }));
        spawn_upstream(app).await
    }

    fn code_for(addr: SocketAddr) -> String {
        crate::crypto::encrypt_link(&format!("http://{addr}/doc.pdf"), PASSPHRASE)
    }

    #[test]
    fn routing_boundaries() {
        for (pages, reward, kind) in [
            (1, 2, JobKind::UploadPdf),
            (2, 5, JobKind::UploadPdf),
            (9, 5, JobKind::UploadPdf),
            (10, 10, JobKind::ProcessPdf),
            (11, 10, JobKind::ProcessPdf),
        ] {
            let decision = RouteDecision::for_page_count(pages);
            assert_eq!(decision.reward, reward, "pages={pages}");
            assert_eq!(decision.kind, kind, "pages={pages}");
        }
    }

    #[tokio::test]
    async fn happy_path_persists_credits_and_queues() {
        let fx = fixture();
        let addr = upstream_serving_pdf(12).await;

        let outcome = fx
            .service
            .ingest("user-1", &code_for(addr), metadata())
            .await
            .unwrap();

        assert_eq!(outcome.pages, 12);
        assert_eq!(outcome.reward, 10);
        assert_eq!(outcome.kind, JobKind::ProcessPdf);

        assert_eq!(fx.materials.count().unwrap(), 1);
        assert_eq!(fx.profiles.get_credits("user-1").unwrap(), Some(10));
        assert_eq!(fx.queue.count_with_status(JobStatus::Pending).unwrap(), 1);

        // The queued job points at an existing scratch file.
        let job = fx.queue.claim_next().unwrap().unwrap();
        assert!(job.payload.filepath.exists());
        assert_eq!(job.payload.destination, metadata().object_key());
    }

    #[tokio::test]
    async fn small_document_gets_upload_job() {
        let fx = fixture();
        let addr = upstream_serving_pdf(1).await;

        let outcome = fx
            .service
            .ingest("user-1", &code_for(addr), metadata())
            .await
            .unwrap();

        assert_eq!(outcome.reward, 2);
        assert_eq!(outcome.kind, JobKind::UploadPdf);
    }

    #[tokio::test]
    async fn second_ingestion_of_same_bytes_is_duplicate() {
        let fx = fixture();
        let addr = upstream_serving_pdf(3).await;

        fx.service
            .ingest("user-1", &code_for(addr), metadata())
            .await
            .unwrap();

        let err = fx
            .service
            .ingest("user-2", &code_for(addr), metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Duplicate));
        // No second row, no credit for the duplicate, no second job.
        assert_eq!(fx.materials.count().unwrap(), 1);
        assert_eq!(fx.profiles.get_credits("user-2").unwrap(), None);
        assert_eq!(fx.queue.count_with_status(JobStatus::Pending).unwrap(), 1);
    }

    #[tokio::test]
    async fn upstream_404_leaves_no_trace() {
        let fx = fixture();
        let app = Router::new().route("/doc.pdf", get(|| async { StatusCode::NOT_FOUND }));
        let addr = spawn_upstream(app).await;

        let err = fx
            .service
            .ingest("user-1", &code_for(addr), metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Fetch(_)));
        assert_eq!(fx.materials.count().unwrap(), 0);
        assert_eq!(fx.profiles.get_credits("user-1").unwrap(), None);
        assert_eq!(fx.queue.count_with_status(JobStatus::Pending).unwrap(), 0);
    }

    #[tokio::test]
    async fn non_pdf_body_is_a_page_count_failure() {
        let fx = fixture();
        let app = Router::new().route("/doc.pdf", get(|| async { "not a pdf at all" }));
        let addr = spawn_upstream(app).await;

        let err = fx
            .service
            .ingest("user-1", &code_for(addr), metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::PageCount(_)));
        assert_eq!(fx.materials.count().unwrap(), 0);
        assert_eq!(fx.queue.count_with_status(JobStatus::Pending).unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_metadata_rejected_before_any_io() {
        let fx = fixture();
        let mut bad = metadata();
        bad.paper_type = crate::metadata::SOLVE_PAPER_TYPE.to_string();

        let err = fx
            .service
            .ingest("user-1", "irrelevant-code", bad)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidMetadata(_)));
    }

    #[tokio::test]
    async fn queue_failure_discards_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("main.db");
        let materials = Arc::new(MaterialRepository::new(&db_path).unwrap());
        let profiles = Arc::new(ProfileRepository::new(&db_path).unwrap());

        // Separate queue database, made unusable after schema init by
        // replacing the file with a directory.
        let queue_db = dir.path().join("queue.db");
        let queue = Arc::new(JobQueue::new(&queue_db, 2).unwrap());
        std::fs::remove_file(&queue_db).unwrap();
        std::fs::create_dir(&queue_db).unwrap();

        let scratch_dir = dir.path().join("scratch");
        let service = IngestService::new(
            materials,
            profiles,
            queue,
            reqwest::Client::new(),
            scratch_dir.clone(),
            PASSPHRASE.to_string(),
        );

        let addr = upstream_serving_pdf(2).await;
        let err = service
            .ingest("user-1", &code_for(addr), metadata())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Queue(_)));
        // The downloaded scratch file did not outlive the failure.
        let leftovers = std::fs::read_dir(&scratch_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn garbage_code_fails_with_generic_fetch_error() {
        let fx = fixture();
        let err = fx
            .service
            .ingest("user-1", "complete garbage", metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Fetch(_)));
        assert_eq!(err.to_string(), "Code is invalid");
    }
}
