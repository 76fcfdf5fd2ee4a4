//! Material repository - the unique-by-hash catalog of accepted documents.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{connect, RepositoryError, Result};
use crate::metadata::StructuredMetadata;
use crate::models::MaterialRecord;

/// SQLite-backed repository for material records.
pub struct MaterialRepository {
    db_path: PathBuf,
}

impl MaterialRepository {
    /// Create a new material repository, initializing the schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS materials (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_materials_user
                ON materials(user_id);
        "#,
        )?;
        Ok(())
    }

    /// Look up a material by content hash.
    pub fn find_by_hash(&self, content_hash: &str) -> Result<Option<MaterialRecord>> {
        let conn = self.connect()?;
        let row: Option<(String, String, String, String, String)> = conn
            .query_row(
                "SELECT id, user_id, content_hash, metadata, created_at
                 FROM materials WHERE content_hash = ?",
                params![content_hash],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(row_to_record).transpose()
    }

    /// Insert a new material row.
    ///
    /// A unique-constraint conflict on the content hash is reported as
    /// [`RepositoryError::DuplicateHash`]; under concurrent ingestion of
    /// identical bytes this insert is the real dedupe backstop.
    pub fn insert(
        &self,
        user_id: &str,
        content_hash: &str,
        metadata: &StructuredMetadata,
    ) -> Result<MaterialRecord> {
        let record = MaterialRecord::new(
            user_id.to_string(),
            content_hash.to_string(),
            metadata.clone(),
        );
        let metadata_json = serde_json::to_string(&record.metadata)?;

        let conn = self.connect()?;
        let result = conn.execute(
            "INSERT INTO materials (id, user_id, content_hash, metadata, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.id,
                record.user_id,
                record.content_hash,
                metadata_json,
                record.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(RepositoryError::DuplicateHash)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Total number of materials in the catalog.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM materials", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn row_to_record(row: (String, String, String, String, String)) -> Result<MaterialRecord> {
    let (id, user_id, content_hash, metadata_json, created_at) = row;
    Ok(MaterialRecord {
        id,
        user_id,
        content_hash,
        metadata: serde_json::from_str(&metadata_json)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(chrono::DateTime::UNIX_EPOCH),
    })
}
