//! rememory-core: the offline inheritance pipeline
//!
//! Seal: files → tar.gz → age scrypt encryption under a fresh passphrase →
//! Shamir split of the passphrase into N labeled shares (any K recover).
//! Recover: shares → combine → decrypt → extract.
//!
//! ```text
//! seal:    pack_tar_gz ─→ encrypt(passphrase) ─→ MANIFEST.age
//!                              │
//!                              └─ shamir::split ─→ Share × N
//!
//! recover: Share × K ─→ shamir::combine ─→ decrypt ─→ extract_tar_gz
//! ```
//!
//! Everything here is synchronous and filesystem-free: callers supply byte
//! buffers or readers/writers, so the same pipeline runs behind the native
//! CLI and behind a browser page.

pub mod archive;
pub mod encrypt;
pub mod error;
pub mod hash;
pub mod names;
pub mod passphrase;
pub mod recover;
pub mod seal;
pub mod shamir;
pub mod share;

pub use archive::{extract_tar_gz, pack_tar_gz, ArchiveFile, MAX_FILE_SIZE, MAX_TOTAL_SIZE};
pub use encrypt::{decrypt, decrypt_bytes, encrypt, encrypt_bytes, DEFAULT_WORK_FACTOR};
pub use error::{RememoryError, RememoryResult};
pub use hash::{hash_bytes, hash_string, verify_hash};
pub use passphrase::{generate_passphrase, DEFAULT_PASSPHRASE_BYTES};
pub use recover::{Progress, RecoverSession};
pub use seal::{seal, Holder, SealOptions, SealOutput};
pub use share::{parse_any, parse_compact, parse_long, parse_share_url, Share, SHARE_VERSION};
