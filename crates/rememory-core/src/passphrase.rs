//! Passphrase generation.
//!
//! The passphrase is the secret that gets threshold-shared, so it carries
//! the full entropy of the scheme: 32 fresh random bytes (256 bits) by
//! default, rendered as URL-safe base64 so it survives QR codes and URL
//! fragments unescaped.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{RememoryError, RememoryResult};

/// Default entropy of a generated passphrase, in bytes.
pub const DEFAULT_PASSPHRASE_BYTES: usize = 32;

/// Minimum entropy accepted for a generated passphrase, in bytes.
pub const MIN_PASSPHRASE_BYTES: usize = 16;

/// Generate a fresh random passphrase from `n_bytes` of CSPRNG output.
///
/// Fails for `n_bytes < 16`; anything weaker defeats the point of the
/// memory-hard KDF downstream.
pub fn generate_passphrase(n_bytes: usize) -> RememoryResult<String> {
    if n_bytes < MIN_PASSPHRASE_BYTES {
        return Err(RememoryError::InvalidParams(format!(
            "passphrase entropy too low: {n_bytes} bytes (minimum {MIN_PASSPHRASE_BYTES})"
        )));
    }

    let mut buf = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    let pass = URL_SAFE_NO_PAD.encode(&buf);
    buf.zeroize();
    Ok(pass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_length_is_url_safe() {
        let pass = generate_passphrase(DEFAULT_PASSPHRASE_BYTES).unwrap();
        assert!(!pass.is_empty());
        assert!(
            !pass.contains(['+', '/', '=']),
            "passphrase must be URL-safe base64 without padding"
        );
    }

    #[test]
    fn minimum_accepted() {
        assert!(generate_passphrase(16).is_ok());
        assert!(generate_passphrase(64).is_ok());
    }

    #[test]
    fn too_small_rejected() {
        let err = generate_passphrase(8).unwrap_err();
        assert!(matches!(err, RememoryError::InvalidParams(_)));
    }

    #[test]
    fn successive_calls_differ() {
        let a = generate_passphrase(32).unwrap();
        let b = generate_passphrase(32).unwrap();
        assert_ne!(a, b, "passphrases must be unique");
    }
}
