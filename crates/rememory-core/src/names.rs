//! Holder-name slugs and the artifact filenames derived from them.
//!
//! One slug rule everywhere: lowercase ASCII, alphanumerics kept, spaces
//! and separator punctuation collapsed to a single `-`, everything else
//! dropped. Slugging is idempotent.

/// Lowercase kebab-case rendering of a holder name.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9') => {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            }
            ' ' | '-' | '_' => pending_dash = true,
            _ => {}
        }
    }

    out
}

/// `SHARE-<slug>.txt`, falling back to the share index when the holder
/// name slugs to nothing.
pub fn share_filename(holder: &str, index: u8) -> String {
    let s = slug(holder);
    if s.is_empty() {
        format!("SHARE-{index}.txt")
    } else {
        format!("SHARE-{s}.txt")
    }
}

/// `bundle-<slug>.zip`, same fallback rule as share filenames.
pub fn bundle_filename(holder: &str, index: u8) -> String {
    let s = slug(holder);
    if s.is_empty() {
        format!("bundle-{index}.zip")
    } else {
        format!("bundle-{s}.zip")
    }
}
