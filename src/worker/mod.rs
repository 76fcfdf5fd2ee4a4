//! Background worker process.
//!
//! Consumes queued jobs with a small fixed pool of polling tasks.
//! `uploadPDF` jobs upload the scratch file as-is; `processPdf` jobs run
//! the external repair pipeline first, re-deriving the destination from
//! the metadata the tool extracts. Each external call is attempted once
//! per delivery - redelivery is the queue's business, not ours.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{JobKind, ProcessJob, QueuedJob};
use crate::repository::JobQueue;
use crate::repair::RepairTool;
use crate::storage::BucketStore;

/// Long-lived queue consumer.
pub struct Worker {
    queue: Arc<JobQueue>,
    store: Arc<BucketStore>,
    repair: Arc<dyn RepairTool>,
    concurrency: usize,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<BucketStore>,
        repair: Arc<dyn RepairTool>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            repair,
            concurrency: concurrency.max(1),
            poll_interval,
        }
    }

    /// Run the worker pool until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        let mut handles = Vec::with_capacity(self.concurrency);

        for worker_id in 0..self.concurrency {
            let worker = self.clone();
            handles.push(tokio::spawn(async move {
                tracing::info!(worker_id, "worker task started");
                loop {
                    match worker.poll_once().await {
                        Ok(true) => {}
                        Ok(false) => tokio::time::sleep(worker.poll_interval).await,
                        Err(e) => {
                            tracing::error!(worker_id, "queue poll failed: {e}");
                            tokio::time::sleep(worker.poll_interval).await;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Claim and process at most one job. Returns whether a job was found.
    pub async fn poll_once(&self) -> anyhow::Result<bool> {
        let job = match self.queue.claim_next()? {
            Some(job) => job,
            None => return Ok(false),
        };

        let job_id = job.id;
        let kind = job.kind;
        match self.process(job).await {
            Ok(()) => {
                self.queue.complete(job_id)?;
                tracing::info!(job = job_id, kind = kind.as_str(), "job completed");
            }
            Err(e) => {
                self.queue.fail(job_id, &e.to_string())?;
                tracing::error!(job = job_id, kind = kind.as_str(), "job failed: {e}");
            }
        }
        Ok(true)
    }

    async fn process(&self, job: QueuedJob) -> anyhow::Result<()> {
        match job.kind {
            JobKind::UploadPdf => self.process_upload(&job.payload).await,
            JobKind::ProcessPdf => self.process_repair(&job.payload).await,
        }
    }

    /// uploadPDF: Fetched -> Uploaded, then scratch cleanup.
    async fn process_upload(&self, payload: &ProcessJob) -> anyhow::Result<()> {
        self.store
            .upload(&payload.filepath, &payload.destination, &payload.metadata)
            .await?;
        self.cleanup(&payload.filepath).await;
        Ok(())
    }

    /// processPdf: Fetched -> OcrCompleted -> Uploaded -> CleanedUp.
    ///
    /// A failure in extraction, repair or upload leaves the scratch file
    /// on disk for the redelivery; cleanup failures after a successful
    /// upload are logged only, since the uploaded object is already
    /// durable.
    async fn process_repair(&self, payload: &ProcessJob) -> anyhow::Result<()> {
        let extracted = self.repair.extract(&payload.filepath).await?;
        let destination = extracted.metadata.object_key();

        let repaired = self
            .repair
            .repair(&payload.filepath, &extracted.metadata)
            .await?;

        self.store
            .upload(&repaired.trimmed, &destination, &payload.metadata)
            .await?;

        self.cleanup(&payload.filepath).await;
        if repaired.trimmed != payload.filepath {
            self.cleanup(&repaired.trimmed).await;
        }
        Ok(())
    }

    async fn cleanup(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("removed scratch file {}", path.display()),
            Err(e) => tracing::warn!("could not remove scratch file {}: {}", path.display(), e),
        }
    }
}
