//! Checksums for migration bodies
//!
//! A script's checksum is the lowercase hex SHA-256 of its body bytes, taken
//! verbatim (no whitespace or line-ending normalisation).

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a script body
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
