//! The recover engine: a session that accumulates shares and a
//! ciphertext, then fires combine → decrypt → extract.
//!
//! Sessions are cumulative: a rejected blob never disturbs the shares
//! already accepted. Duplicate detection is by share index, not blob
//! identity, so a holder re-submitting their own README does not advance
//! the quorum.

use crate::archive::{self, ArchiveFile};
use crate::encrypt;
use crate::error::{RememoryError, RememoryResult};
use crate::shamir;
use crate::share::{self, Share};

/// Quorum accounting for UI display: `(collected, threshold, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub collected: usize,
    pub threshold: usize,
    pub total: usize,
}

/// One in-memory recovery attempt.
#[derive(Debug, Default)]
pub struct RecoverSession {
    shares: Vec<Share>,
    ciphertext: Option<Vec<u8>>,
}

impl RecoverSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `blob` (long form, compact form, or a `#share=` URL) and add
    /// it to the session.
    ///
    /// Returns the parsed share and the updated progress tuple. On any
    /// error the session state is unchanged.
    pub fn add_share(&mut self, blob: &str) -> RememoryResult<(Share, Progress)> {
        let candidate = share::parse_any(blob)?;

        if let Some(existing) = self.shares.first() {
            if candidate.total != existing.total || candidate.threshold != existing.threshold {
                return Err(RememoryError::CohortMismatch(format!(
                    "session is {}-of-{}, share claims {}-of-{}",
                    existing.threshold, existing.total, candidate.threshold, candidate.total
                )));
            }
        }
        if self.shares.iter().any(|s| s.index == candidate.index) {
            return Err(RememoryError::DuplicateIndex(candidate.index));
        }

        tracing::debug!(
            index = candidate.index,
            threshold = candidate.threshold,
            total = candidate.total,
            "share accepted"
        );
        self.shares.push(candidate.clone());
        Ok((candidate, self.progress()))
    }

    /// Attach the ciphertext to decrypt. Idempotent; replacing an earlier
    /// ciphertext is allowed.
    pub fn set_ciphertext(&mut self, bytes: Vec<u8>) {
        self.ciphertext = Some(bytes);
    }

    pub fn has_ciphertext(&self) -> bool {
        self.ciphertext.is_some()
    }

    /// Shares accepted so far.
    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn progress(&self) -> Progress {
        let (threshold, total) = self
            .shares
            .first()
            .map(|s| (s.threshold as usize, s.total as usize))
            .unwrap_or((0, 0));
        Progress {
            collected: self.shares.len(),
            threshold,
            total,
        }
    }

    /// True once the quorum is met and a ciphertext is attached.
    pub fn ready(&self) -> bool {
        let p = self.progress();
        p.threshold > 0 && p.collected >= p.threshold && self.ciphertext.is_some()
    }

    /// Combine the collected shares, decrypt the ciphertext, and extract
    /// the archived files.
    pub fn recover(&self) -> RememoryResult<Vec<ArchiveFile>> {
        let progress = self.progress();
        if progress.threshold == 0 || progress.collected < progress.threshold {
            return Err(RememoryError::NotReady(format!(
                "have {} of {} required shares",
                progress.collected, progress.threshold
            )));
        }
        let Some(ciphertext) = &self.ciphertext else {
            return Err(RememoryError::NotReady("no ciphertext attached".into()));
        };

        let payloads: Vec<Vec<u8>> = self.shares.iter().map(|s| s.data.clone()).collect();
        let secret = shamir::combine(&payloads)?;

        // The shared secret is a passphrase string. A garbage
        // reconstruction (wrong cohort that slipped the checks) is
        // overwhelmingly unlikely to be UTF-8 *and* decrypt; either trip
        // reports as a wrong passphrase.
        let passphrase =
            String::from_utf8(secret).map_err(|_| RememoryError::WrongPassphrase)?;

        let mut plaintext = Vec::new();
        encrypt::decrypt(ciphertext.as_slice(), &mut plaintext, &passphrase)?;

        archive::extract_tar_gz(&plaintext)
    }
}
