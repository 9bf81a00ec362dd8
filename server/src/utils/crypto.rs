//! Hashing helpers

use sha2::{Digest, Sha256};

/// Calculate SHA256 hash and return as hex string
///
/// Used to fingerprint applied schema migrations.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}
