//! Content hashing for deduplication.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a byte slice, lowercase hex encoded.
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 hash of a file's contents.
///
/// Reads the whole file into memory; document sizes make this acceptable.
/// The digest is a stable dedupe identity, not an integrity check against
/// the remote source.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}
