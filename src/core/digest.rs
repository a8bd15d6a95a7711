// ─── Digests ───
// Hex digests used for artifact validation (SHA-1, as published in version
// metadata) and archive entry checksums (SHA-256).

use sha1::Sha1;
use sha2::{Digest, Sha256};

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Case-insensitive comparison of two hex digests.
pub fn same_digest(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
