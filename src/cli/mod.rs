//! CLI parser and command dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::crypto::encrypt_link;
use crate::repair::CommandRepairTool;
use crate::repository::JobQueue;
use crate::storage::BucketStore;
use crate::worker::Worker;

#[derive(Parser)]
#[command(name = "papervault")]
#[command(about = "Study-material ingestion and catalog service")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Host address to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the background job worker
    Worker {
        /// Number of concurrent polling tasks
        #[arg(short = 'w', long)]
        concurrency: Option<usize>,
    },

    /// Encrypt a source URL into a shareable contribution code
    EncryptLink {
        /// The URL to encrypt
        url: String,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            crate::server::serve(&settings, &host, port).await
        }
        Commands::Worker { concurrency } => {
            settings.ensure_dirs()?;

            let queue = Arc::new(JobQueue::new(
                &settings.db_path(),
                settings.worker.max_attempts,
            )?);
            let store = Arc::new(BucketStore::new(
                &settings.bucket_dir(),
                &settings.url_signing_secret,
            )?);
            let repair = Arc::new(CommandRepairTool::new(
                settings.repair.extract_command.clone(),
                settings.repair.repair_command.clone(),
                settings.repair.format.clone(),
            ));

            let worker = Arc::new(Worker::new(
                queue,
                store,
                repair,
                concurrency.unwrap_or(settings.worker.concurrency),
                Duration::from_millis(settings.worker.poll_interval_ms),
            ));
            worker.run().await;
            Ok(())
        }
        Commands::EncryptLink { url } => {
            let code = encrypt_link(&url, &settings.link_passphrase);
            if code.is_empty() {
                anyhow::bail!("encryption failed");
            }
            println!("{code}");
            Ok(())
        }
    }
}
