//! Configuration management for PaperVault.
//!
//! Settings come from an optional TOML file plus `PAPERVAULT_*` environment
//! overrides. Every collaborator (database, scratch dir, bucket, repair
//! tool) is constructed from these settings; there are no ambient
//! module-level clients.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default minutes a signed read URL stays valid.
pub const DEFAULT_SIGNED_URL_MINUTES: u32 = 15;

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for the database, scratch files and bucket.
    pub data_dir: PathBuf,
    /// Shared passphrase for the encrypted link codec.
    pub link_passphrase: String,
    /// Secret used to sign expiring read URLs.
    pub url_signing_secret: String,
    pub server: ServerSettings,
    pub worker: WorkerSettings,
    pub repair: RepairSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upstream fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
}

/// Background worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Number of concurrent polling tasks.
    pub concurrency: usize,
    /// Queue poll interval when idle, in milliseconds.
    pub poll_interval_ms: u64,
    /// Deliveries a job gets before it is marked failed for good.
    pub max_attempts: u32,
}

/// External repair tool settings.
///
/// Both entries are argv vectors; the input path and per-call flags are
/// appended by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSettings {
    /// Command that extracts structured metadata from a PDF (JSON on stdout).
    pub extract_command: Vec<String>,
    /// Command that removes watermarks and trims pages (JSON on stdout).
    pub repair_command: Vec<String>,
    /// Format flag passed to the repair command.
    pub format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            link_passphrase: "change-me".to_string(),
            url_signing_secret: "change-me-too".to_string(),
            server: ServerSettings::default(),
            worker: WorkerSettings::default(),
            repair: RepairSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8350,
            fetch_timeout_secs: 120,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval_ms: 500,
            max_attempts: 2,
        }
    }
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            extract_command: vec!["pdf-extract-meta".to_string()],
            repair_command: vec!["pdf-repair".to_string()],
            format: "doc-repair".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, then apply env overrides.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => {
                let default_path = Path::new("papervault.toml");
                if default_path.exists() {
                    let raw = std::fs::read_to_string(default_path)
                        .context("failed to read papervault.toml")?;
                    toml::from_str(&raw).context("invalid papervault.toml")?
                } else {
                    Settings::default()
                }
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("PAPERVAULT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(passphrase) = std::env::var("PAPERVAULT_LINK_PASSPHRASE") {
            self.link_passphrase = passphrase;
        }
        if let Ok(secret) = std::env::var("PAPERVAULT_SIGNING_SECRET") {
            self.url_signing_secret = secret;
        }
        if let Ok(port) = std::env::var("PAPERVAULT_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// Path to the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("papervault.db")
    }

    /// Directory for in-flight downloads.
    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("scratch")
    }

    /// Root of the filesystem-backed object store.
    pub fn bucket_dir(&self) -> PathBuf {
        self.data_dir.join("bucket")
    }

    /// Create the data directories if missing.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.scratch_dir())?;
        std::fs::create_dir_all(self.bucket_dir())?;
        Ok(())
    }
}
