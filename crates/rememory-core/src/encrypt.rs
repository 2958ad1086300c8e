//! Passphrase encryption in the age scrypt recipient format (age 0.11 API).
//!
//! The on-wire format is a standard age file keyed by an scrypt-derived
//! key, so any age implementation can decrypt a MANIFEST independently of
//! this crate. Encryption always emits the binary format; decryption
//! accepts binary or ASCII-armored input.

use std::io::{Read, Write};
use std::iter;

use age::armor::ArmoredReader;
use secrecy::SecretString;

use crate::error::{RememoryError, RememoryResult};

/// log2 of the scrypt work parameter N used when sealing (N = 2^20).
pub const DEFAULT_WORK_FACTOR: u8 = 20;

/// Encrypt `src` under `passphrase` with the default work factor,
/// writing the age ciphertext to `dst`.
pub fn encrypt<R: Read, W: Write>(src: R, dst: W, passphrase: &str) -> RememoryResult<()> {
    encrypt_with_work_factor(src, dst, passphrase, DEFAULT_WORK_FACTOR)
}

/// Encrypt with an explicit scrypt work factor.
///
/// The default is the right choice for sealing; tests use a lower factor
/// to keep the KDF cheap.
pub fn encrypt_with_work_factor<R: Read, W: Write>(
    mut src: R,
    dst: W,
    passphrase: &str,
    log_n: u8,
) -> RememoryResult<()> {
    if passphrase.is_empty() {
        return Err(RememoryError::EmptyPassphrase);
    }

    let mut recipient = age::scrypt::Recipient::new(SecretString::from(passphrase.to_owned()));
    recipient.set_work_factor(log_n);

    let encryptor = age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
        .map_err(|e| RememoryError::EncryptFailed(e.to_string()))?;

    let mut writer = encryptor
        .wrap_output(dst)
        .map_err(|e| RememoryError::EncryptFailed(e.to_string()))?;
    std::io::copy(&mut src, &mut writer)
        .map_err(|e| RememoryError::EncryptFailed(format!("writing ciphertext: {e}")))?;
    writer
        .finish()
        .map_err(|e| RememoryError::EncryptFailed(format!("finalizing ciphertext: {e}")))?;

    Ok(())
}

/// Decrypt an age scrypt ciphertext from `src` into `dst`.
///
/// Accepts armored or binary input. A wrong passphrase and a garbage key
/// reconstructed from mismatched shares are indistinguishable here; both
/// surface as [`RememoryError::WrongPassphrase`].
pub fn decrypt<R: Read, W: Write>(src: R, mut dst: W, passphrase: &str) -> RememoryResult<()> {
    if passphrase.is_empty() {
        return Err(RememoryError::EmptyPassphrase);
    }

    let decryptor = age::Decryptor::new(ArmoredReader::new(src))
        .map_err(|e| RememoryError::MalformedCiphertext(e.to_string()))?;
    if !decryptor.is_scrypt() {
        return Err(RememoryError::MalformedCiphertext(
            "not a passphrase-encrypted age file".into(),
        ));
    }

    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_owned()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(map_decrypt_err)?;

    // Payload authentication failures (tampering past the header) surface
    // as read errors mid-stream.
    std::io::copy(&mut reader, &mut dst)
        .map_err(|e| RememoryError::MalformedCiphertext(format!("reading payload: {e}")))?;

    Ok(())
}

/// Encrypt a byte slice, returning the ciphertext.
pub fn encrypt_bytes(plaintext: &[u8], passphrase: &str) -> RememoryResult<Vec<u8>> {
    let mut out = Vec::new();
    encrypt(plaintext, &mut out, passphrase)?;
    Ok(out)
}

/// Decrypt a byte slice, returning the plaintext.
pub fn decrypt_bytes(ciphertext: &[u8], passphrase: &str) -> RememoryResult<Vec<u8>> {
    let mut out = Vec::new();
    decrypt(ciphertext, &mut out, passphrase)?;
    Ok(out)
}

fn map_decrypt_err(e: age::DecryptError) -> RememoryError {
    match e {
        age::DecryptError::DecryptionFailed | age::DecryptError::NoMatchingKeys => {
            RememoryError::WrongPassphrase
        }
        other => RememoryError::MalformedCiphertext(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheap KDF for tests; production uses DEFAULT_WORK_FACTOR.
    const TEST_WORK_FACTOR: u8 = 10;

    fn roundtrip(data: &[u8], passphrase: &str) -> Vec<u8> {
        let mut ct = Vec::new();
        encrypt_with_work_factor(data, &mut ct, passphrase, TEST_WORK_FACTOR).unwrap();
        decrypt_bytes(&ct, passphrase).unwrap()
    }

    #[test]
    fn roundtrip_small() {
        assert_eq!(roundtrip(b"hello world", "test-passphrase-12345"), b"hello world");
    }

    #[test]
    fn roundtrip_empty() {
        assert_eq!(roundtrip(b"", "test-passphrase-12345"), b"");
    }

    #[test]
    fn roundtrip_large() {
        let data = vec![b'x'; 10_000];
        assert_eq!(roundtrip(&data, "test-passphrase-12345"), data);
    }

    #[test]
    fn roundtrip_unicode() {
        let data = "Hello 世界 🌍".as_bytes();
        assert_eq!(roundtrip(data, "test-passphrase-12345"), data);
    }

    #[test]
    fn empty_passphrase_rejected() {
        let mut ct = Vec::new();
        assert!(matches!(
            encrypt(&b"data"[..], &mut ct, ""),
            Err(RememoryError::EmptyPassphrase)
        ));
        assert!(matches!(
            decrypt_bytes(b"irrelevant", ""),
            Err(RememoryError::EmptyPassphrase)
        ));
    }

    #[test]
    fn wrong_passphrase_detected() {
        let mut ct = Vec::new();
        encrypt_with_work_factor(&b"secret"[..], &mut ct, "p1", TEST_WORK_FACTOR).unwrap();
        assert!(matches!(
            decrypt_bytes(&ct, "p2"),
            Err(RememoryError::WrongPassphrase)
        ));
    }

    #[test]
    fn garbage_ciphertext_is_malformed() {
        assert!(matches!(
            decrypt_bytes(b"definitely not an age file", "p"),
            Err(RememoryError::MalformedCiphertext(_))
        ));
    }
}
