//! Content fetcher.
//!
//! Streams a remote file to local scratch storage. A single attempt is
//! made per call; retry policy belongs to the caller. Failures carry an
//! intentionally vague user-facing message so the decrypted source URL
//! never leaks back to the contributor.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// User-facing message for any fetch failure. Deliberately vague.
pub const INVALID_CODE_MESSAGE: &str = "Code is invalid";

/// Typed fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {0}")]
    BadStatus(u16),
    /// Connection, DNS or mid-body transport error.
    #[error("transport error: {0}")]
    Transport(String),
    /// Local filesystem error while writing the download.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A completed download.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Download `url` to `dest`, streaming the body to disk.
///
/// Missing parent directories are created. On a transport error any
/// partial file is removed best-effort before the error is returned.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<FetchOutcome, FetchError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return Err(FetchError::Transport(e.to_string())),
    };

    if !response.status().is_success() {
        return Err(FetchError::BadStatus(response.status().as_u16()));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    // Any failure past this point leaves a partial file; clean it up
    // on the way out regardless of whether the body or the disk failed.
    let result = async {
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| FetchError::Transport(e.to_string()))?;
            file.write_all(&bytes).await?;
            written += bytes.len() as u64;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        drop(file);
        remove_partial(dest).await;
        return Err(e);
    }

    Ok(FetchOutcome {
        path: dest.to_path_buf(),
        bytes: written,
    })
}

async fn remove_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        tracing::debug!("could not remove partial download {}: {}", dest.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn streams_body_to_disk() {
        let body: Vec<u8> = (0..64_000u32).map(|i| (i % 251) as u8).collect();
        let served = body.clone();
        let app = Router::new().route("/doc.pdf", get(move || async move { served.clone() }));
        let addr = spawn_upstream(app).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("doc.pdf");
        let client = reqwest::Client::new();

        let outcome = fetch_to_file(&client, &format!("http://{}/doc.pdf", addr), &dest)
            .await
            .unwrap();

        assert_eq!(outcome.bytes, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn not_found_is_a_bad_status() {
        let app = Router::new().route("/gone.pdf", get(|| async { StatusCode::NOT_FOUND }));
        let addr = spawn_upstream(app).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.pdf");
        let client = reqwest::Client::new();

        let err = fetch_to_file(&client, &format!("http://{}/gone.pdf", addr), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::BadStatus(404)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn mid_stream_failure_removes_partial_file() {
        use tokio::io::AsyncReadExt;

        // Raw socket upstream: promises 100000 bytes, sends a few, dies.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100000\r\n\r\npartial body")
                .await;
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("doc.pdf");
        let client = reqwest::Client::new();

        let err = fetch_to_file(&client, &format!("http://{}/doc.pdf", addr), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nope.pdf");
        let client = reqwest::Client::new();

        // Empty URL is what a failed decrypt produces.
        let err = fetch_to_file(&client, "", &dest).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert!(!dest.exists());
    }
}
