//! The plain-text README placed in every holder's bundle.
//!
//! It has to make sense to a non-technical reader years from now with no
//! other context: what this is, what to do, who else holds a share, and
//! the share itself in its long form so the recovery page (or any text
//! editor plus the CLI) can read it straight out of this document.

use chrono::{DateTime, Utc};
use rememory_core::seal::Holder;
use rememory_core::share::Share;

/// Everything the README renders. Checksums are of the sibling bundle
/// entries so a holder can verify what they received.
#[derive(Debug, Clone)]
pub struct ReadmeData<'a> {
    pub project_name: &'a str,
    pub holder: &'a str,
    pub share: &'a Share,
    /// The other holders; skipped entirely in anonymous mode.
    pub co_holders: &'a [Holder],
    pub threshold: u8,
    pub total: u8,
    pub version: &'a str,
    pub github_url: &'a str,
    pub manifest_checksum: &'a str,
    pub recover_checksum: &'a str,
    pub created: DateTime<Utc>,
    /// Omit the co-holder contact list.
    pub anonymous: bool,
}

/// Render the README document.
pub fn render_readme(d: &ReadmeData) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n{}\n\n",
        d.project_name,
        "=".repeat(d.project_name.chars().count())
    ));

    out.push_str(&format!(
        "Hello {},\n\n\
         You are holding one piece of an encrypted backup. On its own this\n\
         piece reveals nothing. If {} of the {} holders bring their pieces\n\
         together, the backup can be opened.\n\n",
        d.holder, d.threshold, d.total
    ));

    out.push_str(
        "WHAT TO DO NOW\n\n\
         1. Keep this bundle somewhere safe (printed, on a USB stick, in a\n\
            password manager). Do not share it with anyone.\n\
         2. That's it. You only act if the person who gave you this can no\n\
            longer open the backup themselves.\n\n",
    );

    out.push_str(
        "WHEN THE TIME COMES\n\n\
         1. Open recover.html from this bundle in any web browser. It works\n\
            without an internet connection.\n\
         2. Follow the page: paste the shares you collect from the other\n\
            holders. This document contains yours, below.\n\
         3. The page needs the encrypted manifest too. This bundle carries\n\
            it as MANIFEST.age, and your recover.html has a copy embedded.\n\n",
    );

    if !d.anonymous && !d.co_holders.is_empty() {
        out.push_str("THE OTHER HOLDERS\n\n");
        for h in d.co_holders {
            match &h.contact {
                Some(contact) => out.push_str(&format!("  - {} ({})\n", h.name, contact)),
                None => out.push_str(&format!("  - {}\n", h.name)),
            }
        }
        out.push('\n');
    }

    out.push_str("YOUR SHARE\n\n");
    out.push_str(&d.share.encode());
    out.push('\n');

    out.push_str(&format!(
        "INTEGRITY\n\n\
         MANIFEST.age   {}\n\
         recover.html   {}\n\n",
        d.manifest_checksum, d.recover_checksum
    ));

    out.push_str(&format!(
        "Created {} with rememory {}.\n\
         Command-line tool and documentation: {}\n",
        d.created.format("%Y-%m-%d"),
        d.version,
        d.github_url
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rememory_core::share::parse_long;

    fn sample() -> (Share, Vec<Holder>) {
        let mut data = vec![1u8];
        data.extend_from_slice(b"share-payload");
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let share = Share::new(1, 3, 2, "Alice", Some(created), data);
        let others = vec![
            Holder::with_contact("Bob", "bob@example.com"),
            Holder::new("Carol"),
        ];
        (share, others)
    }

    fn data<'a>(share: &'a Share, others: &'a [Holder], anonymous: bool) -> ReadmeData<'a> {
        ReadmeData {
            project_name: "Family Archive",
            holder: "Alice",
            share,
            co_holders: others,
            threshold: 2,
            total: 3,
            version: "0.4.2",
            github_url: "https://github.com/tinyland-inc/rememory/releases",
            manifest_checksum: "sha256:abc123",
            recover_checksum: "sha256:def456",
            created: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            anonymous,
        }
    }

    #[test]
    fn embedded_share_parses_back() {
        let (share, others) = sample();
        let readme = render_readme(&data(&share, &others, false));

        let parsed = parse_long(&readme).unwrap();
        assert_eq!(parsed, share);
    }

    #[test]
    fn contact_list_present() {
        let (share, others) = sample();
        let readme = render_readme(&data(&share, &others, false));
        assert!(readme.contains("Bob (bob@example.com)"));
        assert!(readme.contains("- Carol"));
        assert!(readme.contains("sha256:abc123"));
        assert!(readme.contains("sha256:def456"));
    }

    #[test]
    fn anonymous_mode_omits_contacts() {
        let (share, others) = sample();
        let readme = render_readme(&data(&share, &others, true));
        assert!(!readme.contains("THE OTHER HOLDERS"));
        assert!(!readme.contains("bob@example.com"));
        // The share still parses.
        assert!(parse_long(&readme).is_ok());
    }
}
