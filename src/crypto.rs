//! Encrypted link codec.
//!
//! Contributed links arrive as opaque codes issued by the browser
//! extension. The code is base64(nonce || ciphertext) under
//! ChaCha20-Poly1305 with a key derived from the shared passphrase.
//! Encryption draws a fresh nonce per call, so the same URL never
//! produces the same code twice. Decryption with the wrong passphrase
//! or a malformed code yields an empty string; callers treat empty as
//! failure rather than panicking.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

/// Nonce length for ChaCha20-Poly1305.
const NONCE_LEN: usize = 12;

fn cipher_for(passphrase: &str) -> ChaCha20Poly1305 {
    let digest = Sha256::digest(passphrase.as_bytes());
    ChaCha20Poly1305::new(Key::from_slice(digest.as_slice()))
}

/// Encrypt a plain URL into an opaque code.
pub fn encrypt_link(url: &str, passphrase: &str) -> String {
    let cipher = cipher_for(passphrase);
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    match cipher.encrypt(&nonce, url.as_bytes()) {
        Ok(ciphertext) => {
            let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
            raw.extend_from_slice(&nonce);
            raw.extend_from_slice(&ciphertext);
            BASE64.encode(raw)
        }
        Err(_) => String::new(),
    }
}

/// Decrypt an opaque code back into a URL.
///
/// Returns an empty string on any failure: bad base64, truncated input,
/// or an authentication failure from a wrong passphrase.
pub fn decrypt_link(code: &str, passphrase: &str) -> String {
    let raw = match BASE64.decode(code.trim()) {
        Ok(raw) => raw,
        Err(_) => return String::new(),
    };
    if raw.len() <= NONCE_LEN {
        return String::new();
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    let cipher = cipher_for(passphrase);
    match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
        Ok(plaintext) => String::from_utf8(plaintext).unwrap_or_default(),
        Err(_) => String::new(),
    }
}
