//! Profile repository - per-user credit balances.
//!
//! Credits are a single integer per profile, mutated by addition
//! (ingestion rewards) or subtraction (download purchases). No
//! adjustment history is kept here.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{connect, RepositoryError, Result};

/// SQLite-backed repository for user profiles.
pub struct ProfileRepository {
    db_path: PathBuf,
}

impl ProfileRepository {
    /// Create a new profile repository, initializing the schema.
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
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                credits INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Current balance, or `None` if the user has no profile row yet.
    pub fn get_credits(&self, user_id: &str) -> Result<Option<i64>> {
        let conn = self.connect()?;
        let credits = conn
            .query_row(
                "SELECT credits FROM profiles WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(credits)
    }

    /// Add `delta` credits, creating the profile on first grant.
    /// Returns the new balance.
    pub fn add_credits(&self, user_id: &str, delta: i64) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO profiles (user_id, credits, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 credits = credits + excluded.credits,
                 updated_at = excluded.updated_at",
            params![user_id, delta, Utc::now().to_rfc3339()],
        )?;
        let credits = conn.query_row(
            "SELECT credits FROM profiles WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(credits)
    }

    /// Overwrite a user's balance.
    pub fn set_credits(&self, user_id: &str, credits: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO profiles (user_id, credits, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 credits = excluded.credits,
                 updated_at = excluded.updated_at",
            params![user_id, credits, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Spend credits atomically. Fails with `ProfileNotFound` when no
    /// profile exists and `InsufficientCredits` when the balance is too
    /// low. Returns the new balance.
    pub fn deduct_credits(&self, user_id: &str, amount: i64) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<i64> = (|| {
            let credits: Option<i64> = conn
                .query_row(
                    "SELECT credits FROM profiles WHERE user_id = ?",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let credits = credits.ok_or(RepositoryError::ProfileNotFound)?;
            if credits < amount {
                return Err(RepositoryError::InsufficientCredits);
            }

            let remaining = credits - amount;
            conn.execute(
                "UPDATE profiles SET credits = ?2, updated_at = ?3 WHERE user_id = ?1",
                params![user_id, remaining, Utc::now().to_rfc3339()],
            )?;
            Ok(remaining)
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }
}
