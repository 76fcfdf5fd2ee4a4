//! Queued processing jobs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metadata::StructuredMetadata;

/// The two kinds of background work a material can need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Upload the downloaded file as-is.
    #[serde(rename = "uploadPDF")]
    UploadPdf,
    /// Run the repair pipeline (metadata extraction + watermark trim)
    /// before uploading.
    #[serde(rename = "processPdf")]
    ProcessPdf,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadPdf => "uploadPDF",
            Self::ProcessPdf => "processPdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploadPDF" => Some(Self::UploadPdf),
            "processPdf" => Some(Self::ProcessPdf),
            _ => None,
        }
    }
}

/// Lifecycle of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Queue payload. Owned by the queue between enqueue and pickup; the
/// scratch file it points at belongs to whichever process holds the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessJob {
    /// Local scratch path of the downloaded file.
    pub filepath: PathBuf,
    /// Derived object-store destination key.
    pub destination: String,
    pub metadata: StructuredMetadata,
}

/// A job claimed from the queue.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: i64,
    pub kind: JobKind,
    pub payload: ProcessJob,
    pub attempts: u32,
}
