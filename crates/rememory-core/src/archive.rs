//! Deterministic tar.gz packaging and hardened in-memory extraction.
//!
//! Only regular files travel through the archive. Extraction screens
//! entry names for path traversal, skips anything that is not a regular
//! file, and enforces per-file and cumulative size caps before buffering.

use std::io::Read;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;

use crate::error::{RememoryError, RememoryResult};

/// Maximum size of a single file (100 MiB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum total size across all files (1 GiB).
pub const MAX_TOTAL_SIZE: u64 = 1024 * 1024 * 1024;

static PATH_TRAVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|/)\.\.(/|$)").expect("static pattern"));

/// A named file buffer, both the input to packing and the output of
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Pack files into a gzipped tarball. All entries are regular files with
/// mode 0644 and `mtime` (the seal instant), so output is deterministic
/// given the same inputs and instant.
pub fn pack_tar_gz(files: &[ArchiveFile], mtime: DateTime<Utc>) -> RememoryResult<Vec<u8>> {
    if files.is_empty() {
        return Err(RememoryError::ArchiveFailed("nothing to archive".into()));
    }

    let mut total: u64 = 0;
    for f in files {
        let size = f.data.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(RememoryError::ArchiveFailed(format!(
                "file {} exceeds maximum allowed size ({MAX_FILE_SIZE} bytes)",
                f.name
            )));
        }
        total += size;
        if total > MAX_TOTAL_SIZE {
            return Err(RememoryError::ArchiveFailed(format!(
                "archive exceeds maximum total size ({MAX_TOTAL_SIZE} bytes)"
            )));
        }
    }

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for f in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(f.data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime.timestamp().max(0) as u64);
        builder
            .append_data(&mut header, &f.name, f.data.as_slice())
            .map_err(|e| RememoryError::ArchiveFailed(format!("writing {}: {e}", f.name)))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| RememoryError::ArchiveFailed(format!("finalizing tar: {e}")))?;
    encoder
        .finish()
        .map_err(|e| RememoryError::ArchiveFailed(format!("finalizing gzip: {e}")))
}

/// Extract files from tar.gz bytes in memory.
pub fn extract_tar_gz(data: &[u8]) -> RememoryResult<Vec<ArchiveFile>> {
    extract_tar_gz_reader(data)
}

/// Extract files from a tar.gz reader in memory.
pub fn extract_tar_gz_reader<R: Read>(r: R) -> RememoryResult<Vec<ArchiveFile>> {
    let mut archive = tar::Archive::new(GzDecoder::new(r));
    let mut files = Vec::new();
    let mut total: u64 = 0;

    let entries = archive
        .entries()
        .map_err(|e| RememoryError::ArchiveFailed(format!("reading archive: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| RememoryError::ArchiveFailed(format!("reading tar entry: {e}")))?;

        let name = match std::str::from_utf8(&entry.path_bytes()) {
            Ok(s) => s.to_owned(),
            Err(_) => {
                return Err(RememoryError::ArchiveFailed(
                    "archive contains a non-UTF-8 path".into(),
                ))
            }
        };

        // Traversal screening applies to every entry, including ones we
        // would otherwise skip.
        if PATH_TRAVERSAL.is_match(&name) {
            return Err(RememoryError::ArchiveFailed(format!(
                "archive contains invalid path: {name}"
            )));
        }

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let size = entry
            .header()
            .size()
            .map_err(|e| RememoryError::ArchiveFailed(format!("reading size of {name}: {e}")))?;
        if size > MAX_FILE_SIZE {
            return Err(RememoryError::ArchiveFailed(format!(
                "file {name} exceeds maximum allowed size ({MAX_FILE_SIZE} bytes)"
            )));
        }
        total += size;
        if total > MAX_TOTAL_SIZE {
            return Err(RememoryError::ArchiveFailed(format!(
                "archive exceeds maximum total size ({MAX_TOTAL_SIZE} bytes)"
            )));
        }

        let mut data = Vec::with_capacity(size as usize);
        entry
            .by_ref()
            .take(MAX_FILE_SIZE)
            .read_to_end(&mut data)
            .map_err(|e| RememoryError::ArchiveFailed(format!("reading {name}: {e}")))?;

        files.push(ArchiveFile { name, data });
    }

    if files.is_empty() {
        return Err(RememoryError::ArchiveFailed("empty archive".into()));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> Vec<ArchiveFile> {
        vec![
            ArchiveFile { name: "a.txt".into(), data: b"hello".to_vec() },
            ArchiveFile { name: "dir/b.txt".into(), data: b"world".to_vec() },
        ]
    }

    fn pack(files: &[ArchiveFile]) -> Vec<u8> {
        pack_tar_gz(files, Utc::now()).unwrap()
    }

    #[test]
    fn pack_extract_roundtrip() {
        let files = sample_files();
        let extracted = extract_tar_gz(&pack(&files)).unwrap();
        assert_eq!(extracted, files);
    }

    #[test]
    fn deterministic_given_instant() {
        let files = sample_files();
        let at = Utc::now();
        assert_eq!(pack_tar_gz(&files, at).unwrap(), pack_tar_gz(&files, at).unwrap());
    }

    #[test]
    fn empty_input_rejected_both_ways() {
        assert!(matches!(
            pack_tar_gz(&[], Utc::now()),
            Err(RememoryError::ArchiveFailed(_))
        ));
        assert!(matches!(
            extract_tar_gz(&[]),
            Err(RememoryError::ArchiveFailed(_))
        ));
    }

    #[test]
    fn traversal_rejected() {
        for evil in ["../evil", "a/../b", "a/.."] {
            let data = pack(&[ArchiveFile { name: evil.into(), data: b"x".to_vec() }]);
            let err = extract_tar_gz(&data).unwrap_err();
            assert!(
                matches!(err, RememoryError::ArchiveFailed(_)),
                "{evil} must be rejected"
            );
        }
    }

    #[test]
    fn dotdot_in_filename_is_fine() {
        // Only `..` as a full path segment is traversal.
        let files = vec![ArchiveFile { name: "notes..txt".into(), data: b"ok".to_vec() }];
        let extracted = extract_tar_gz(&pack(&files)).unwrap();
        assert_eq!(extracted, files);
    }

    #[test]
    fn directories_are_skipped() {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_cksum();
        builder.append_data(&mut dir, "subdir", &[][..]).unwrap();

        let mut file = tar::Header::new_gnu();
        file.set_entry_type(tar::EntryType::Regular);
        file.set_size(2);
        file.set_mode(0o644);
        builder.append_data(&mut file, "subdir/f", &b"ok"[..]).unwrap();

        let data = builder.into_inner().unwrap().finish().unwrap();
        let extracted = extract_tar_gz(&data).unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].name, "subdir/f");
    }

    #[test]
    fn garbage_input_rejected() {
        assert!(matches!(
            extract_tar_gz(b"not a gzip stream"),
            Err(RememoryError::ArchiveFailed(_))
        ));
    }
}
