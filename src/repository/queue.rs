//! Durable background job queue.
//!
//! SQLite-backed, FIFO per job kind, at-least-once delivery. `enqueue`
//! returns once the row is committed, not once the job is processed.
//! A failed delivery is requeued until the attempt budget is spent;
//! workers must tolerate redelivery. A claimed job whose worker dies
//! without resolving it is requeued once its visibility timeout lapses.
//! Dedupe is not this layer's job - the content-hash check happens
//! before anything is enqueued.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{connect, Result};
use crate::models::{JobKind, JobStatus, ProcessJob, QueuedJob};

/// How long a claimed job may sit in `running` before any worker is
/// allowed to reclaim it.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(300);

/// SQLite-backed job queue.
pub struct JobQueue {
    db_path: PathBuf,
    max_attempts: u32,
    visibility_timeout: Duration,
}

impl JobQueue {
    /// Create a new queue, initializing the schema.
    pub fn new(db_path: &Path, max_attempts: u32) -> Result<Self> {
        let queue = Self {
            db_path: db_path.to_path_buf(),
            max_attempts: max_attempts.max(1),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        };
        queue.init_schema()?;
        Ok(queue)
    }

    /// Override the stale-claim visibility timeout.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status
                ON jobs(status, id);
        "#,
        )?;
        Ok(())
    }

    /// Durably accept a job. Returns the job id once the row is committed.
    pub fn enqueue(&self, kind: JobKind, payload: &ProcessJob) -> Result<i64> {
        let payload_json = serde_json::to_string(payload)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO jobs (kind, payload, status, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, ?3)",
            params![kind.as_str(), payload_json, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Atomically claim the oldest pending job, flipping it to running.
    ///
    /// Before selecting, any `running` row older than the visibility
    /// timeout is flipped back to `pending` so a crashed worker's claim
    /// does not strand the job.
    pub fn claim_next(&self) -> Result<Option<QueuedJob>> {
        let conn = self.connect()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<Option<QueuedJob>> = (|| {
            let cutoff = (Utc::now()
                - chrono::Duration::seconds(self.visibility_timeout.as_secs() as i64))
            .to_rfc3339();
            conn.execute(
                "UPDATE jobs SET status = 'pending', updated_at = ?2
                 WHERE status = 'running' AND updated_at <= ?1",
                params![cutoff, Utc::now().to_rfc3339()],
            )?;

            let row = conn.query_row(
                "SELECT id, kind, payload, attempts FROM jobs
                 WHERE status = 'pending'
                 ORDER BY id ASC
                 LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            );

            let (id, kind, payload_json, attempts) = match row {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            conn.execute(
                "UPDATE jobs SET status = 'running', updated_at = ?2 WHERE id = ?1",
                params![id, Utc::now().to_rfc3339()],
            )?;

            let kind = JobKind::from_str(&kind).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(1, "kind".to_string(), rusqlite::types::Type::Text)
            })?;

            Ok(Some(QueuedJob {
                id,
                kind,
                payload: serde_json::from_str(&payload_json)?,
                attempts: attempts.max(0) as u32,
            }))
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    /// Mark a claimed job as successfully processed.
    pub fn complete(&self, job_id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE jobs SET status = 'done', updated_at = ?2 WHERE id = ?1",
            params![job_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record a failed delivery. The job is requeued for redelivery until
    /// its attempt budget is spent, then marked failed for good.
    pub fn fail(&self, job_id: i64, error: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE jobs SET
                 attempts = attempts + 1,
                 last_error = ?2,
                 updated_at = ?3,
                 status = CASE WHEN attempts + 1 >= ?4 THEN 'failed' ELSE 'pending' END
             WHERE id = ?1",
            params![job_id, error, Utc::now().to_rfc3339(), self.max_attempts],
        )?;
        Ok(())
    }

    /// Count jobs in the given status.
    pub fn count_with_status(&self, status: JobStatus) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StructuredMetadata;
    use std::path::PathBuf;

    fn payload(name: &str) -> ProcessJob {
        ProcessJob {
            filepath: PathBuf::from(format!("/tmp/{name}.pdf")),
            destination: format!("sem-1/cse/{name}/notes.pdf"),
            metadata: StructuredMetadata {
                semester: "sem-1".to_string(),
                branch: "cse".to_string(),
                subject: name.to_string(),
                paper_type: "notes".to_string(),
                solve_type: None,
                unit_or_year: None,
            },
        }
    }

    fn queue(max_attempts: u32) -> (JobQueue, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::new(&dir.path().join("test.db"), max_attempts).unwrap();
        (queue, dir)
    }

    #[test]
    fn enqueue_claim_complete() {
        let (queue, _dir) = queue(2);
        let id = queue.enqueue(JobKind::UploadPdf, &payload("dbms")).unwrap();

        let job = queue.claim_next().unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.kind, JobKind::UploadPdf);
        assert_eq!(job.payload.metadata.subject, "dbms");
        assert_eq!(job.attempts, 0);

        // Claimed job is no longer visible.
        assert!(queue.claim_next().unwrap().is_none());

        queue.complete(id).unwrap();
        assert_eq!(queue.count_with_status(JobStatus::Done).unwrap(), 1);
        assert_eq!(queue.count_with_status(JobStatus::Pending).unwrap(), 0);
    }

    #[test]
    fn claims_are_fifo() {
        let (queue, _dir) = queue(2);
        queue.enqueue(JobKind::UploadPdf, &payload("first")).unwrap();
        queue.enqueue(JobKind::ProcessPdf, &payload("second")).unwrap();

        let a = queue.claim_next().unwrap().unwrap();
        let b = queue.claim_next().unwrap().unwrap();
        assert_eq!(a.payload.metadata.subject, "first");
        assert_eq!(b.payload.metadata.subject, "second");
    }

    #[test]
    fn failed_job_is_redelivered_then_exhausted() {
        let (queue, _dir) = queue(2);
        let id = queue.enqueue(JobKind::ProcessPdf, &payload("flaky")).unwrap();

        let job = queue.claim_next().unwrap().unwrap();
        queue.fail(job.id, "ocr exploded").unwrap();

        // First failure requeues for a second delivery.
        let redelivered = queue.claim_next().unwrap().unwrap();
        assert_eq!(redelivered.id, id);
        assert_eq!(redelivered.attempts, 1);

        queue.fail(redelivered.id, "ocr exploded again").unwrap();
        assert!(queue.claim_next().unwrap().is_none());
        assert_eq!(queue.count_with_status(JobStatus::Failed).unwrap(), 1);
    }

    #[test]
    fn stale_claim_is_requeued_for_another_worker() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let queue = JobQueue::new(&db_path, 2).unwrap();
        let id = queue.enqueue(JobKind::ProcessPdf, &payload("stranded")).unwrap();

        // A worker claims the job and then dies without resolving it.
        queue.claim_next().unwrap().unwrap();

        // Within the visibility timeout the claim is honored.
        let patient = JobQueue::new(&db_path, 2).unwrap();
        assert!(patient.claim_next().unwrap().is_none());
        assert_eq!(patient.count_with_status(JobStatus::Running).unwrap(), 1);

        // Once it lapses, another worker picks the job back up.
        let reclaiming = JobQueue::new(&db_path, 2)
            .unwrap()
            .with_visibility_timeout(std::time::Duration::ZERO);
        let job = reclaiming.claim_next().unwrap().unwrap();
        assert_eq!(job.id, id);
    }
}
