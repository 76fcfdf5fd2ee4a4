//! Material records - unique-by-content documents accepted into the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::StructuredMetadata;

/// A persisted material row.
///
/// `content_hash` is unique; a second ingestion of the same bytes is
/// rejected at insert time by the store's constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    pub user_id: String,
    pub content_hash: String,
    pub metadata: StructuredMetadata,
    pub created_at: DateTime<Utc>,
}

impl MaterialRecord {
    /// Build a new record with a fresh id and timestamp.
    pub fn new(user_id: String, content_hash: String, metadata: StructuredMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            content_hash,
            metadata,
            created_at: Utc::now(),
        }
    }
}
