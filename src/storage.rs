//! Filesystem-backed object store with signed read URLs.
//!
//! Objects live under a bucket root addressed by the hierarchical key
//! the path mapper derives from metadata. A sidecar `<key>.meta.json`
//! carries the material metadata next to each object. Read access goes
//! through expiring HMAC-signed URLs so the bucket itself never has to
//! be public.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use crate::metadata::StructuredMetadata;

type HmacSha256 = Hmac<Sha256>;

/// Expiry bounds for signed URLs, in minutes.
const MIN_SIGNED_MINUTES: u32 = 1;
const MAX_SIGNED_MINUTES: u32 = 1440;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("signing failed")]
    Signing,
}

/// A signed, expiring read URL.
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    /// Unix milliseconds after which the URL stops verifying.
    pub expires: i64,
}

/// Filesystem-rooted object store.
pub struct BucketStore {
    root: PathBuf,
    signing_key: Vec<u8>,
}

impl BucketStore {
    /// Open (and create if needed) a bucket rooted at `root`.
    pub fn new(root: &Path, signing_secret: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            signing_key: signing_secret.as_bytes().to_vec(),
        })
    }

    /// Resolve a key to its on-disk path, rejecting traversal attempts.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StorageError::InvalidKey(key.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    /// Whether an object exists under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.object_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Upload a local file to `key`, writing the metadata sidecar.
    /// Returns the normalized key.
    pub async fn upload(
        &self,
        local: &Path,
        key: &str,
        metadata: &StructuredMetadata,
    ) -> Result<String, StorageError> {
        let dest = self.object_path(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &dest).await?;

        let sidecar = dest.with_extension("meta.json");
        let metadata_json = serde_json::to_vec_pretty(metadata)?;
        tokio::fs::write(&sidecar, metadata_json).await?;

        Ok(key.trim_start_matches('/').to_string())
    }

    /// Issue a signed read URL for `key`.
    ///
    /// Expiry is clamped to 1..=1440 minutes. An optional download
    /// filename rides along and is applied as a Content-Disposition at
    /// serve time.
    pub fn signed_read_url(
        &self,
        key: &str,
        minutes: u32,
        filename: Option<&str>,
    ) -> Result<SignedUrl, StorageError> {
        let key = key.trim_start_matches('/');
        let minutes = minutes.clamp(MIN_SIGNED_MINUTES, MAX_SIGNED_MINUTES);
        let expires = Utc::now().timestamp_millis() + i64::from(minutes) * 60_000;
        let sig = self.signature(key, expires)?;

        let mut url = format!("/files/{key}?expires={expires}&sig={sig}");
        if let Some(filename) = filename {
            url.push_str("&filename=");
            url.push_str(&urlencoding::encode(filename));
        }
        Ok(SignedUrl { url, expires })
    }

    /// Verify a signed read for `key`. Checks expiry first, then the MAC
    /// in constant time.
    pub fn verify_read(&self, key: &str, expires: i64, sig: &str) -> bool {
        if Utc::now().timestamp_millis() > expires {
            return false;
        }
        let sig_bytes = match hex::decode(sig) {
            Ok(sig_bytes) => sig_bytes,
            Err(_) => return false,
        };
        let mac = match self.mac_for(key.trim_start_matches('/'), expires) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.verify_slice(&sig_bytes).is_ok()
    }

    fn mac_for(&self, key: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.signing_key).map_err(|_| StorageError::Signing)?;
        mac.update(key.as_bytes());
        mac.update(b"|");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn signature(&self, key: &str, expires: i64) -> Result<String, StorageError> {
        let mac = self.mac_for(key, expires)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
