//! The share object and its two wire serializations.
//!
//! Long form (embedded in each holder's README):
//!
//! ```text
//! -----BEGIN REMEMORY SHARE-----
//! Version: 1
//! Index: 1
//! Total: 3
//! Threshold: 2
//! Holder: Alice
//! Created: 2026-01-02T03:04:05Z
//! Checksum: sha256:<hex>
//!
//! <base64 payload, wrapped at 64 columns>
//! -----END REMEMORY SHARE-----
//! ```
//!
//! Compact form (QR codes and URL fragments):
//!
//! ```text
//! RM1:<index>:<total>:<threshold>:<b64url-nopad>:<check4>
//! ```
//!
//! Headers are parsed key-driven in any order; the parser tolerates being
//! handed a whole README and locates the sentinels itself. Every parse
//! path ends in the same well-formedness check: recognized version, sane
//! bounds, payload index byte equal to the Index header, and a matching
//! checksum.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::percent_decode_str;

use crate::error::{RememoryError, RememoryResult};
use crate::hash::{hash_bytes, verify_hash};
use crate::names;

/// The only share format version emitted or accepted today.
pub const SHARE_VERSION: u32 = 1;

const SHARE_BEGIN: &str = "-----BEGIN REMEMORY SHARE-----";
const SHARE_END: &str = "-----END REMEMORY SHARE-----";
const COMPACT_TAG: &str = "RM1";
const B64_WRAP_WIDTH: usize = 64;

/// One labeled piece of the threshold-split passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub version: u32,
    /// 1-based share index; always equals `data[0]`.
    pub index: u8,
    /// Total number of shares in the cohort (N).
    pub total: u8,
    /// Minimum shares needed to recover (K).
    pub threshold: u8,
    /// Free-text holder label; UX metadata only, may be empty.
    pub holder: String,
    /// Seal instant; absent when parsed from the compact form.
    pub created: Option<DateTime<Utc>>,
    /// Opaque payload from the threshold split: `index ‖ evaluations`.
    pub data: Vec<u8>,
    /// `sha256:<hex>` of `data`; tamper detection only.
    pub checksum: String,
}

impl Share {
    /// Build a share over `data`, computing its checksum.
    pub fn new(
        index: u8,
        total: u8,
        threshold: u8,
        holder: &str,
        created: Option<DateTime<Utc>>,
        data: Vec<u8>,
    ) -> Self {
        let checksum = hash_bytes(&data);
        Self {
            version: SHARE_VERSION,
            index,
            total,
            threshold,
            holder: holder.to_owned(),
            created,
            data,
            checksum,
        }
    }

    /// Well-formedness check: every parser and the recover session call
    /// this before trusting a share.
    pub fn verify(&self) -> RememoryResult<()> {
        if self.version != SHARE_VERSION {
            return Err(RememoryError::NotWellFormed(format!(
                "unsupported share version {}",
                self.version
            )));
        }
        if self.total < 2 {
            return Err(RememoryError::NotWellFormed(format!(
                "total {} is below minimum 2",
                self.total
            )));
        }
        if self.threshold < 2 || self.threshold > self.total {
            return Err(RememoryError::NotWellFormed(format!(
                "threshold {} out of range for total {}",
                self.threshold, self.total
            )));
        }
        if self.index < 1 || self.index > self.total {
            return Err(RememoryError::NotWellFormed(format!(
                "index {} out of range for total {}",
                self.index, self.total
            )));
        }
        if self.data.is_empty() {
            return Err(RememoryError::NotWellFormed("share payload is empty".into()));
        }
        if self.data[0] != self.index {
            return Err(RememoryError::NotWellFormed(format!(
                "payload index byte {} disagrees with Index {}",
                self.data[0], self.index
            )));
        }
        if !verify_hash(&hash_bytes(&self.data), &self.checksum) {
            return Err(RememoryError::NotWellFormed("checksum mismatch".into()));
        }
        Ok(())
    }

    /// Emit the long (PEM-like) form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(SHARE_BEGIN);
        out.push('\n');
        out.push_str(&format!("Version: {}\n", self.version));
        out.push_str(&format!("Index: {}\n", self.index));
        out.push_str(&format!("Total: {}\n", self.total));
        out.push_str(&format!("Threshold: {}\n", self.threshold));
        out.push_str(&format!("Holder: {}\n", self.holder));
        if let Some(created) = self.created {
            out.push_str(&format!(
                "Created: {}\n",
                created.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        out.push_str(&format!("Checksum: {}\n", self.checksum));
        out.push('\n');

        let b64 = STANDARD.encode(&self.data);
        let bytes = b64.as_bytes();
        for chunk in bytes.chunks(B64_WRAP_WIDTH) {
            // Base64 output is pure ASCII, chunking cannot split a char.
            out.push_str(std::str::from_utf8(chunk).expect("base64 is ASCII"));
            out.push('\n');
        }

        out.push_str(SHARE_END);
        out.push('\n');
        out
    }

    /// Emit the compact single-line form (omits holder and created).
    pub fn compact_encode(&self) -> String {
        format!(
            "{COMPACT_TAG}:{}:{}:{}:{}:{}",
            self.index,
            self.total,
            self.threshold,
            URL_SAFE_NO_PAD.encode(&self.data),
            check4(&self.data),
        )
    }

    /// Filename this share is written under: `SHARE-<slug>.txt`.
    pub fn filename(&self) -> String {
        names::share_filename(&self.holder, self.index)
    }
}

/// First 4 lowercase hex chars of SHA-256(data): a 16-bit transport
/// integrity check, not a cryptographic guarantee.
fn check4(data: &[u8]) -> String {
    let full = hash_bytes(data);
    full["sha256:".len().."sha256:".len() + 4].to_owned()
}

/// Parse a share in whichever serialization `blob` carries.
///
/// Accepts the long form (possibly embedded in a larger document), the
/// compact form, and a recovery-page URL with a `#share=` fragment.
pub fn parse_any(blob: &str) -> RememoryResult<Share> {
    if blob.contains(SHARE_BEGIN) {
        return parse_long(blob);
    }
    if blob.contains("#share=") {
        return parse_share_url(blob);
    }
    let trimmed = blob.trim();
    if trimmed.starts_with("RM") && trimmed.contains(':') {
        return parse_compact(trimmed);
    }
    Err(RememoryError::NotWellFormed("no share found in input".into()))
}

/// Parse the long form, locating the first BEGIN sentinel and the END
/// sentinel after it inside a possibly larger document.
pub fn parse_long(content: &str) -> RememoryResult<Share> {
    let begin = content
        .find(SHARE_BEGIN)
        .ok_or_else(|| RememoryError::NotWellFormed("no share found in content".into()))?;
    let after_begin = begin + SHARE_BEGIN.len();
    let end_rel = content[after_begin..]
        .find(SHARE_END)
        .ok_or_else(|| RememoryError::NotWellFormed("share end marker missing".into()))?;
    let inner = &content[after_begin..after_begin + end_rel];

    let mut version: Option<u32> = None;
    let mut index: Option<u8> = None;
    let mut total: Option<u8> = None;
    let mut threshold: Option<u8> = None;
    let mut holder = String::new();
    let mut created: Option<DateTime<Utc>> = None;
    let mut checksum: Option<String> = None;
    let mut payload_b64 = String::new();
    let mut in_payload = false;

    for line in inner.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            // First blank line switches from headers to payload.
            in_payload = true;
            continue;
        }

        if in_payload {
            payload_b64.push_str(line);
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Version" => version = Some(parse_num(value, "Version")?),
            "Index" => index = Some(parse_num(value, "Index")?),
            "Total" => total = Some(parse_num(value, "Total")?),
            "Threshold" => threshold = Some(parse_num(value, "Threshold")?),
            "Holder" => holder = value.to_owned(),
            "Created" => {
                let t = DateTime::parse_from_rfc3339(value).map_err(|e| {
                    RememoryError::NotWellFormed(format!("invalid Created timestamp: {e}"))
                })?;
                created = Some(t.with_timezone(&Utc));
            }
            "Checksum" => checksum = Some(value.to_owned()),
            _ => {} // unknown headers are forward-compatible
        }
    }

    let data = STANDARD
        .decode(payload_b64.as_bytes())
        .map_err(|e| RememoryError::NotWellFormed(format!("invalid base64 payload: {e}")))?;

    let share = Share {
        version: version
            .ok_or_else(|| RememoryError::NotWellFormed("missing Version header".into()))?,
        index: index.ok_or_else(|| RememoryError::NotWellFormed("missing Index header".into()))?,
        total: total.ok_or_else(|| RememoryError::NotWellFormed("missing Total header".into()))?,
        threshold: threshold
            .ok_or_else(|| RememoryError::NotWellFormed("missing Threshold header".into()))?,
        holder,
        created,
        data,
        checksum: checksum
            .ok_or_else(|| RememoryError::NotWellFormed("missing Checksum header".into()))?,
    };
    share.verify()?;
    Ok(share)
}

/// Parse the compact form `RM1:<idx>:<total>:<threshold>:<b64url>:<check4>`.
pub fn parse_compact(s: &str) -> RememoryResult<Share> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 6 {
        return Err(RememoryError::NotWellFormed(format!(
            "compact share has {} fields, want 6",
            parts.len()
        )));
    }

    if parts[0] != COMPACT_TAG {
        if parts[0].len() > 2
            && parts[0].starts_with("RM")
            && parts[0][2..].chars().all(|c| c.is_ascii_digit())
        {
            return Err(RememoryError::UnknownCompactVersion(parts[0].to_owned()));
        }
        return Err(RememoryError::NotWellFormed(format!(
            "unrecognized compact tag: {}",
            parts[0]
        )));
    }

    let index: u8 = parse_num(parts[1], "index")?;
    let total: u8 = parse_num(parts[2], "total")?;
    let threshold: u8 = parse_num(parts[3], "threshold")?;

    let data = URL_SAFE_NO_PAD
        .decode(parts[4].as_bytes())
        .map_err(|e| RememoryError::NotWellFormed(format!("invalid base64url payload: {e}")))?;

    if !verify_hash(&check4(&data), parts[5]) {
        return Err(RememoryError::NotWellFormed(
            "compact integrity check failed".into(),
        ));
    }

    let share = Share::new(index, total, threshold, "", None, data);
    share.verify()?;
    Ok(share)
}

/// Parse a recovery-page URL carrying `#share=<compact>` in its fragment.
/// The fragment value is URL-decoded exactly once, then parsed compact.
pub fn parse_share_url(url: &str) -> RememoryResult<Share> {
    let start = url
        .find("#share=")
        .ok_or_else(|| RememoryError::NotWellFormed("URL has no #share= fragment".into()))?;
    let value = &url[start + "#share=".len()..];
    let value = value.split('&').next().unwrap_or(value);

    let decoded = percent_decode_str(value)
        .decode_utf8()
        .map_err(|e| RememoryError::NotWellFormed(format!("invalid fragment encoding: {e}")))?;
    parse_compact(&decoded)
}

fn parse_num<T: std::str::FromStr>(value: &str, field: &str) -> RememoryResult<T> {
    value
        .parse()
        .map_err(|_| RememoryError::NotWellFormed(format!("invalid {field}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_share() -> Share {
        let mut data = vec![1u8];
        data.extend_from_slice(b"test-share-payload");
        let created = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        Share::new(1, 5, 3, "Alice", Some(created), data)
    }

    #[test]
    fn long_form_roundtrip() {
        let share = sample_share();
        let encoded = share.encode();

        assert!(encoded.starts_with(SHARE_BEGIN));
        assert!(encoded.trim_end().ends_with(SHARE_END));

        let parsed = parse_long(&encoded).unwrap();
        assert_eq!(parsed, share);
    }

    #[test]
    fn long_form_inside_readme() {
        let share = sample_share();
        let doc = format!(
            "INSTRUCTIONS\n\nKeep this safe.\n\n{}\nContact Bob if anything happens.\n",
            share.encode()
        );
        assert_eq!(parse_long(&doc).unwrap(), share);
        assert_eq!(parse_any(&doc).unwrap(), share);
    }

    #[test]
    fn long_form_header_order_is_free() {
        let share = sample_share();
        let b64 = STANDARD.encode(&share.data);
        let scrambled = format!(
            "{SHARE_BEGIN}\nChecksum: {}\nHolder: Alice\nThreshold: 3\nTotal: 5\nIndex: 1\nVersion: 1\nCreated: 2026-01-02T03:04:05Z\nX-Future: ignored\n\n{b64}\n{SHARE_END}\n",
            share.checksum
        );
        assert_eq!(parse_long(&scrambled).unwrap(), share);
    }

    #[test]
    fn long_form_extra_whitespace_tolerated() {
        let share = sample_share();
        let b64 = STANDARD.encode(&share.data);
        let spaced = format!(
            "{SHARE_BEGIN}\n  Version:  1 \n Index: 1\nTotal: 5\nThreshold: 3\nHolder:   Alice\nCreated: 2026-01-02T03:04:05Z\nChecksum:  {}\n\n  {b64}  \n{SHARE_END}\n",
            share.checksum
        );
        assert_eq!(parse_long(&spaced).unwrap(), share);
    }

    #[test]
    fn compact_roundtrip() {
        let share = sample_share();
        let compact = share.compact_encode();
        assert!(compact.starts_with("RM1:"));
        assert!(!compact.contains(['+', '/', '=']));

        let parsed = parse_compact(&compact).unwrap();
        assert_eq!(parsed.index, share.index);
        assert_eq!(parsed.total, share.total);
        assert_eq!(parsed.threshold, share.threshold);
        assert_eq!(parsed.data, share.data);
        assert!(parsed.verify().is_ok());
        // holder/created are not carried by the compact form
        assert!(parsed.holder.is_empty());
        assert!(parsed.created.is_none());
    }

    #[test]
    fn url_fragment_roundtrip() {
        let share = sample_share();
        let compact = share.compact_encode();
        let encoded: String = percent_encoding::utf8_percent_encode(
            &compact,
            percent_encoding::NON_ALPHANUMERIC,
        )
        .to_string();
        let url = format!("https://example.com/recover.html#share={encoded}");

        let parsed = parse_share_url(&url).unwrap();
        assert_eq!(parsed.data, share.data);
        assert_eq!(parsed.index, share.index);

        // parse_any recognizes URLs too
        assert_eq!(parse_any(&url).unwrap().data, share.data);
    }

    #[test]
    fn tampered_payload_rejected() {
        let share = sample_share();
        let encoded = share.encode();

        // Flip one character inside the base64 payload.
        let payload_start = encoded.find("\n\n").unwrap() + 2;
        let mut bytes = encoded.into_bytes();
        bytes[payload_start] = if bytes[payload_start] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(matches!(
            parse_long(&tampered),
            Err(RememoryError::NotWellFormed(_))
        ));
    }

    #[test]
    fn tampered_checksum_rejected() {
        let share = sample_share();
        let encoded = share.encode();
        let tampered = if encoded.contains("Checksum: sha256:a") {
            encoded.replace("Checksum: sha256:a", "Checksum: sha256:b")
        } else {
            // First hex char wasn't 'a'; flip whatever is there to 'a'.
            let pos = encoded.find("Checksum: sha256:").unwrap() + "Checksum: sha256:".len();
            let mut bytes = encoded.into_bytes();
            bytes[pos] = if bytes[pos] == b'a' { b'b' } else { b'a' };
            String::from_utf8(bytes).unwrap()
        };

        assert!(matches!(
            parse_long(&tampered),
            Err(RememoryError::NotWellFormed(_))
        ));
    }

    #[test]
    fn compact_tampered_check_rejected() {
        let share = sample_share();
        let compact = share.compact_encode();
        let pos = compact.rfind(':').unwrap() + 1;
        let mut bytes = compact.into_bytes();
        bytes[pos] = if bytes[pos] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(matches!(
            parse_compact(&tampered),
            Err(RememoryError::NotWellFormed(_))
        ));
    }

    #[test]
    fn payload_index_must_match_header() {
        let mut data = vec![2u8]; // disagrees with Index: 1
        data.extend_from_slice(b"payload");
        let share = Share::new(1, 3, 2, "Alice", None, data);
        assert!(matches!(
            share.verify(),
            Err(RememoryError::NotWellFormed(_))
        ));
        assert!(matches!(
            parse_long(&share.encode()),
            Err(RememoryError::NotWellFormed(_))
        ));
    }

    #[test]
    fn bounds_enforced() {
        let mk = |index: u8, total: u8, threshold: u8| {
            let mut data = vec![index];
            data.extend_from_slice(b"d");
            Share::new(index, total, threshold, "", None, data)
        };
        assert!(mk(1, 1, 1).verify().is_err()); // total < 2
        assert!(mk(1, 3, 1).verify().is_err()); // threshold < 2
        assert!(mk(1, 3, 4).verify().is_err()); // threshold > total
        assert!(mk(4, 3, 2).verify().is_err()); // index > total
        assert!(mk(1, 3, 2).verify().is_ok());
    }

    #[test]
    fn unknown_compact_tag() {
        let share = sample_share();
        let compact = share.compact_encode().replacen("RM1:", "RM2:", 1);
        assert!(matches!(
            parse_compact(&compact),
            Err(RememoryError::UnknownCompactVersion(_))
        ));

        let garbled = share.compact_encode().replacen("RM1:", "XX1:", 1);
        assert!(matches!(
            parse_compact(&garbled),
            Err(RememoryError::NotWellFormed(_))
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let share = sample_share();
        let encoded = share.encode().replace("Version: 1", "Version: 9");
        assert!(matches!(
            parse_long(&encoded),
            Err(RememoryError::NotWellFormed(_))
        ));
    }

    #[test]
    fn empty_holder_falls_back_to_index() {
        let mut data = vec![2u8];
        data.extend_from_slice(b"x");
        let share = Share::new(2, 3, 2, "", None, data);
        assert_eq!(share.filename(), "SHARE-2.txt");

        let named = sample_share();
        assert_eq!(named.filename(), "SHARE-alice.txt");
    }
}
