//! Content fingerprints used as card cache keys

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest
pub const FINGERPRINT_LEN: usize = 16;

/// Short SHA-256 hex digest of the composed card HTML.
pub fn content_hash(html: &str) -> String {
    let digest = Sha256::digest(html.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
