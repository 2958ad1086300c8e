//! The seal pipeline: archive → encrypt → split → label → self-verify.
//!
//! Sealing is all-or-nothing. The passphrase lives only inside this call:
//! it is drawn (or taken from the caller), used once for encryption,
//! split into shares, fingerprinted, and wiped. The output never contains
//! it.

use chrono::{DateTime, Timelike, Utc};
use zeroize::Zeroize;

use crate::archive::{self, ArchiveFile};
use crate::encrypt;
use crate::error::{RememoryError, RememoryResult};
use crate::hash;
use crate::passphrase::{self, DEFAULT_PASSPHRASE_BYTES};
use crate::recover::RecoverSession;
use crate::shamir;
use crate::share::Share;

/// A custodian of one share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    pub name: String,
    pub contact: Option<String>,
}

impl Holder {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), contact: None }
    }

    pub fn with_contact(name: &str, contact: &str) -> Self {
        Self { name: name.to_owned(), contact: Some(contact.to_owned()) }
    }
}

/// Parameters for a seal run.
#[derive(Debug, Clone)]
pub struct SealOptions {
    /// Total number of shares (N).
    pub total: usize,
    /// Shares required to recover (K).
    pub threshold: usize,
    /// Explicit passphrase; a fresh 32-byte one is generated when absent.
    pub passphrase: Option<String>,
    /// scrypt work factor (log2 N); tests lower this.
    pub work_factor: u8,
}

impl SealOptions {
    pub fn new(total: usize, threshold: usize) -> Self {
        Self {
            total,
            threshold,
            passphrase: None,
            work_factor: encrypt::DEFAULT_WORK_FACTOR,
        }
    }
}

/// Everything a seal run persists. The passphrase itself is gone by the
/// time this is returned; only its fingerprint survives.
#[derive(Debug)]
pub struct SealOutput {
    /// The age ciphertext (`MANIFEST.age`).
    pub manifest: Vec<u8>,
    /// One share per holder, index order.
    pub shares: Vec<Share>,
    /// `sha256:` digest of the passphrase, for later sanity checks.
    pub passphrase_fingerprint: String,
    /// The seal instant, shared by archive mtimes and share labels.
    pub created: DateTime<Utc>,
}

/// Seal `files` for `holders`: any `threshold` of the returned shares
/// plus the manifest recover the files exactly.
pub fn seal(
    files: &[ArchiveFile],
    holders: &[Holder],
    opts: &SealOptions,
) -> RememoryResult<SealOutput> {
    shamir::validate_params(opts.total, opts.threshold)?;
    if holders.len() != opts.total {
        return Err(RememoryError::InvalidParams(format!(
            "holder count {} does not match total shares {}",
            holders.len(),
            opts.total
        )));
    }

    // Second precision so the instant survives an RFC 3339 round-trip.
    let created = Utc::now();
    let created = created.with_nanosecond(0).unwrap_or(created);

    let plaintext = archive::pack_tar_gz(files, created)?;

    let mut pass = match &opts.passphrase {
        Some(p) if p.is_empty() => return Err(RememoryError::EmptyPassphrase),
        Some(p) => p.clone(),
        None => passphrase::generate_passphrase(DEFAULT_PASSPHRASE_BYTES)?,
    };

    let mut manifest = Vec::new();
    encrypt::encrypt_with_work_factor(
        plaintext.as_slice(),
        &mut manifest,
        &pass,
        opts.work_factor,
    )?;

    let payloads = shamir::split(pass.as_bytes(), opts.total, opts.threshold).map_err(|e| {
        match e {
            RememoryError::InvalidParams(msg) => RememoryError::SplitFailed(msg),
            other => other,
        }
    })?;

    let shares: Vec<Share> = payloads
        .into_iter()
        .zip(holders)
        .enumerate()
        .map(|(i, (payload, holder))| {
            Share::new(
                (i + 1) as u8,
                opts.total as u8,
                opts.threshold as u8,
                &holder.name,
                Some(created),
                payload,
            )
        })
        .collect();

    let fingerprint = hash::hash_string(&pass);
    pass.zeroize();

    // Prove the artifacts round-trip before letting anything out.
    self_verify(files, &shares, &manifest, opts.threshold)?;

    tracing::debug!(
        total = opts.total,
        threshold = opts.threshold,
        files = files.len(),
        manifest_bytes = manifest.len(),
        "seal self-test passed"
    );

    Ok(SealOutput {
        manifest,
        shares,
        passphrase_fingerprint: fingerprint,
        created,
    })
}

/// Run the real recover pipeline over K of the freshly minted shares and
/// require byte-identical output.
fn self_verify(
    files: &[ArchiveFile],
    shares: &[Share],
    manifest: &[u8],
    threshold: usize,
) -> RememoryResult<()> {
    let mut session = RecoverSession::new();
    for share in shares.iter().take(threshold) {
        session
            .add_share(&share.encode())
            .map_err(|e| RememoryError::SealSelfTest(format!("emitted share rejected: {e}")))?;
    }
    session.set_ciphertext(manifest.to_vec());

    let recovered = session
        .recover()
        .map_err(|e| RememoryError::SealSelfTest(format!("recovery failed: {e}")))?;

    if recovered.len() != files.len() {
        return Err(RememoryError::SealSelfTest(format!(
            "recovered {} files, sealed {}",
            recovered.len(),
            files.len()
        )));
    }
    for (sealed, got) in files.iter().zip(&recovered) {
        if sealed.name != got.name || sealed.data != got.data {
            return Err(RememoryError::SealSelfTest(format!(
                "recovered file {} differs from input",
                got.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keep the scrypt KDF cheap in tests.
    fn test_opts(total: usize, threshold: usize) -> SealOptions {
        SealOptions {
            work_factor: 10,
            ..SealOptions::new(total, threshold)
        }
    }

    fn sample_files() -> Vec<ArchiveFile> {
        vec![
            ArchiveFile { name: "a.txt".into(), data: b"hello".to_vec() },
            ArchiveFile { name: "b.txt".into(), data: b"world".to_vec() },
        ]
    }

    fn holders(names: &[&str]) -> Vec<Holder> {
        names.iter().map(|n| Holder::new(n)).collect()
    }

    #[test]
    fn seal_produces_labeled_shares() {
        let out = seal(
            &sample_files(),
            &holders(&["Alice", "Bob", "Carol"]),
            &test_opts(3, 2),
        )
        .unwrap();

        assert_eq!(out.shares.len(), 3);
        assert!(!out.manifest.is_empty());
        assert!(out.passphrase_fingerprint.starts_with("sha256:"));

        for (i, share) in out.shares.iter().enumerate() {
            assert_eq!(share.index as usize, i + 1);
            assert_eq!(share.total, 3);
            assert_eq!(share.threshold, 2);
            assert_eq!(share.created, Some(out.created));
            assert!(share.verify().is_ok());
        }
        assert_eq!(out.shares[0].holder, "Alice");
        assert_eq!(out.shares[2].holder, "Carol");
    }

    #[test]
    fn explicit_passphrase_is_fingerprinted_not_returned() {
        let mut opts = test_opts(3, 2);
        opts.passphrase = Some("chosen-by-sealer".into());

        let out = seal(&sample_files(), &holders(&["A", "B", "C"]), &opts).unwrap();
        assert_eq!(
            out.passphrase_fingerprint,
            crate::hash::hash_string("chosen-by-sealer")
        );
    }

    #[test]
    fn empty_passphrase_rejected() {
        let mut opts = test_opts(3, 2);
        opts.passphrase = Some(String::new());
        assert!(matches!(
            seal(&sample_files(), &holders(&["A", "B", "C"]), &opts),
            Err(RememoryError::EmptyPassphrase)
        ));
    }

    #[test]
    fn holder_count_must_match_total() {
        assert!(matches!(
            seal(&sample_files(), &holders(&["A", "B"]), &test_opts(3, 2)),
            Err(RememoryError::InvalidParams(_))
        ));
    }

    #[test]
    fn bad_params_rejected() {
        assert!(matches!(
            seal(&sample_files(), &holders(&["A"]), &test_opts(1, 1)),
            Err(RememoryError::InvalidParams(_))
        ));
    }
}
