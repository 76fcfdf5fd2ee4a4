//! Repository layer for SQLite persistence.
//!
//! Repositories hold only a database path and open a connection per call;
//! WAL mode plus a busy timeout keeps the server and the worker process
//! coordinated on the same file.

pub mod material;
pub mod profile;
pub mod queue;

pub use material::MaterialRepository;
pub use profile::ProfileRepository;
pub use queue::JobQueue;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

/// Repository result type.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors surfaced by the repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Insert hit the unique content-hash constraint. This is the
    /// authoritative dedupe signal, not a hard failure.
    #[error("material with this content hash already exists")]
    DuplicateHash,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("insufficient credits")]
    InsufficientCredits,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    /// Whether this error is the duplicate-content signal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateHash)
    }
}

/// Open a connection with the pragmas shared by all repositories.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}
