//! rememory-bundle: per-holder distribution bundles.
//!
//! A bundle is the ZIP a holder actually receives:
//!
//! ```text
//! bundle-<slug>.zip
//! ├── README.txt     instructions + contact list + the share (long form)
//! ├── README.pdf     optional typeset rendering (supplied by the caller)
//! ├── MANIFEST.age   the ciphertext
//! └── recover.html   self-contained recovery page, personalized
//! ```
//!
//! The recovery page may embed the ciphertext (`manifestB64` in its
//! personalization block), which makes the single HTML file a complete
//! recovery kit on its own.

pub mod extract;
pub mod page;
pub mod readme;
pub mod zip;

pub use extract::{extract_manifest, ExtractError};
pub use page::{render_create_page, render_recover_page, PageConfig, Personalization};
pub use readme::{render_readme, ReadmeData};
pub use zip::{find_entry, read_zip, write_zip, ZipEntry};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use rememory_core::hash::{hash_bytes, verify_hash};
use rememory_core::seal::Holder;
use rememory_core::share::{parse_long, Share};

const README_NAME: &str = "README.txt";
const README_PDF_NAME: &str = "README.pdf";
const MANIFEST_NAME: &str = "MANIFEST.age";
const RECOVER_NAME: &str = "recover.html";

/// Settings shared by every bundle of a seal run.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    pub version: String,
    pub github_url: String,
    /// Compiled recovery module embedded into recover.html.
    pub wasm_bytes: Vec<u8>,
    /// Embed the ciphertext into recover.html. Opting out keeps bundles
    /// small but forces holders to supply MANIFEST.age separately.
    pub embed_manifest: bool,
    /// Omit the co-holder contact list from README documents.
    pub anonymous: bool,
}

/// Inputs for one holder's bundle.
#[derive(Debug, Clone)]
pub struct BundleRequest<'a> {
    pub project_name: &'a str,
    pub holder: &'a Holder,
    pub share: &'a Share,
    /// Every holder except the recipient.
    pub co_holders: &'a [Holder],
    /// The age ciphertext (`MANIFEST.age`).
    pub manifest: &'a [u8],
    /// Optional typeset README; rendering it is not this crate's job.
    pub readme_pdf: Option<&'a [u8]>,
    /// The seal instant; becomes every entry's modification time.
    pub created: DateTime<Utc>,
}

/// What `open_bundle` recovers from a bundle ZIP.
#[derive(Debug)]
pub struct BundleContents {
    pub share: Share,
    pub manifest: Vec<u8>,
    pub recover_html: Vec<u8>,
    pub readme: String,
}

/// Findings of `verify_bundle`, for CLI display.
#[derive(Debug)]
pub struct BundleReport {
    pub holder: String,
    pub index: u8,
    pub total: u8,
    pub threshold: u8,
    pub manifest_checksum: String,
    pub recover_checksum: String,
    /// Whether recover.html embeds the ciphertext (verified identical).
    pub manifest_embedded: bool,
    pub has_pdf: bool,
}

/// Build one holder's bundle ZIP.
pub fn build_bundle(req: &BundleRequest, cfg: &BundleConfig) -> Result<Vec<u8>> {
    let mut personalization = Personalization::new(
        &req.holder.name,
        req.share.threshold,
        req.share.total,
    );
    if cfg.embed_manifest {
        personalization = personalization.with_manifest(req.manifest);
    }

    let page_cfg = PageConfig {
        version: cfg.version.clone(),
        github_url: cfg.github_url.clone(),
        wasm_bytes: cfg.wasm_bytes.clone(),
    };
    let recover_html = render_recover_page(&page_cfg, Some(&personalization))
        .context("rendering recovery page")?;

    let readme = render_readme(&ReadmeData {
        project_name: req.project_name,
        holder: &req.holder.name,
        share: req.share,
        co_holders: req.co_holders,
        threshold: req.share.threshold,
        total: req.share.total,
        version: &cfg.version,
        github_url: &cfg.github_url,
        manifest_checksum: &hash_bytes(req.manifest),
        recover_checksum: &hash_bytes(recover_html.as_bytes()),
        created: req.created,
        anonymous: cfg.anonymous,
    });

    let mut entries = vec![ZipEntry {
        name: README_NAME.into(),
        data: readme.into_bytes(),
    }];
    if let Some(pdf) = req.readme_pdf {
        entries.push(ZipEntry { name: README_PDF_NAME.into(), data: pdf.to_vec() });
    }
    entries.push(ZipEntry { name: MANIFEST_NAME.into(), data: req.manifest.to_vec() });
    entries.push(ZipEntry { name: RECOVER_NAME.into(), data: recover_html.into_bytes() });

    tracing::debug!(
        holder = %req.holder.name,
        index = req.share.index,
        embed_manifest = cfg.embed_manifest,
        "bundle assembled"
    );

    write_zip(&entries, req.created)
}

/// Open a bundle ZIP and pull out the share and ciphertext, so a whole
/// bundle can be fed into a recovery session.
///
/// The ciphertext comes from `MANIFEST.age` when present, falling back to
/// the copy embedded in `recover.html`.
pub fn open_bundle(zip_bytes: &[u8]) -> Result<BundleContents> {
    let entries = read_zip(zip_bytes).context("opening bundle")?;

    let readme_entry =
        find_entry(&entries, README_NAME).context("bundle has no README.txt")?;
    let readme = String::from_utf8(readme_entry.data.clone())
        .context("README.txt is not valid UTF-8")?;

    let share = parse_long(&readme).context("parsing share from README.txt")?;

    let recover_html = find_entry(&entries, RECOVER_NAME)
        .map(|e| e.data.clone())
        .unwrap_or_default();

    let manifest = match find_entry(&entries, MANIFEST_NAME) {
        Some(e) => e.data.clone(),
        None => extract_manifest(&recover_html)
            .context("bundle has no MANIFEST.age and no embedded manifest")?,
    };

    Ok(BundleContents { share, manifest, recover_html, readme })
}

fn require_entry<'a>(entries: &'a [ZipEntry], name: &str) -> Result<&'a ZipEntry> {
    find_entry(entries, name)
        .with_context(|| format!("bundle is missing required entry {name}"))
}

/// Structurally verify a bundle: required entries, share integrity, and
/// agreement between `MANIFEST.age` and the page-embedded copy.
pub fn verify_bundle(zip_bytes: &[u8]) -> Result<BundleReport> {
    let entries = read_zip(zip_bytes).context("opening bundle")?;

    let readme_entry = require_entry(&entries, README_NAME)?;
    let manifest = &require_entry(&entries, MANIFEST_NAME)?.data;
    let recover_html = &require_entry(&entries, RECOVER_NAME)?.data;

    let readme = String::from_utf8(readme_entry.data.clone())
        .context("README.txt is not valid UTF-8")?;
    let share = parse_long(&readme).context("share embedded in README.txt is invalid")?;

    let manifest_checksum = hash_bytes(manifest);
    let manifest_embedded = match extract_manifest(recover_html) {
        Ok(embedded) => {
            if !verify_hash(&hash_bytes(&embedded), &manifest_checksum) {
                bail!("embedded manifest in recover.html differs from MANIFEST.age");
            }
            true
        }
        Err(ExtractError::NoEmbeddedManifest) | Err(ExtractError::NoPersonalization) => false,
        Err(e) => return Err(e).context("inspecting recover.html personalization"),
    };

    Ok(BundleReport {
        holder: share.holder.clone(),
        index: share.index,
        total: share.total,
        threshold: share.threshold,
        manifest_checksum,
        recover_checksum: hash_bytes(recover_html),
        manifest_embedded,
        has_pdf: find_entry(&entries, README_PDF_NAME).is_some(),
    })
}
