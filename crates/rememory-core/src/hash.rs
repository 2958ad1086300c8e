//! Content hashing with a canonical `sha256:<hex>` rendering.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Returns the SHA-256 hash of bytes, prefixed with `sha256:`.
pub fn hash_bytes(b: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(b))
}

/// Returns the SHA-256 hash of a string, prefixed with `sha256:`.
pub fn hash_string(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Checks whether `got` matches `expected` in constant time.
///
/// Used wherever attacker-controlled bytes are compared against a
/// reference digest (share checksums, bundle verification).
pub fn verify_hash(got: &str, expected: &str) -> bool {
    got.as_bytes().ct_eq(expected.as_bytes()).into()
}
