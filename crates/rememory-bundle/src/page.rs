//! Recovery-page emission by single-pass token substitution.
//!
//! The page templates carry literal tokens (`{{STYLES}}`, `{{WASM_EXEC}}`,
//! `{{APP_JS}}` / `{{CREATE_APP_JS}}`, `{{WASM_BASE64}}`, `{{VERSION}}`,
//! `{{GITHUB_URL}}`, `{{PERSONALIZATION}}`); emission replaces each once,
//! in order, with no re-scanning of substituted content. The result is a
//! fully self-contained page that works from `file://`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

// Compile-time page assets, the counterpart of the CLI's embedded
// recovery module.
const RECOVER_TEMPLATE: &str = include_str!("../assets/recover.html");
const CREATE_TEMPLATE: &str = include_str!("../assets/rememory.html");
const STYLES_CSS: &str = include_str!("../assets/styles.css");
const APP_JS: &str = include_str!("../assets/app.js");
const CREATE_APP_JS: &str = include_str!("../assets/create-app.js");
const WASM_EXEC_JS: &str = include_str!("../assets/wasm_exec.js");

/// Inputs shared by every page emission.
#[derive(Debug, Clone)]
pub struct PageConfig {
    /// Tool version shown in the page footer.
    pub version: String,
    /// Release URL for downloading the CLI.
    pub github_url: String,
    /// The compiled recovery module, embedded as base64.
    pub wasm_bytes: Vec<u8>,
}

/// The JSON object assigned to `window.PERSONALIZATION` in a holder's
/// page. Keys are camelCase for the JavaScript side; unknown keys are
/// forward-compatible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personalization {
    #[serde(default)]
    pub holder: String,
    #[serde(default)]
    pub threshold: u8,
    #[serde(default)]
    pub total: u8,
    /// Standard-base64 ciphertext; absent when the bundle opts out of
    /// embedding (size pressure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_b64: Option<String>,
}

impl Personalization {
    pub fn new(holder: &str, threshold: u8, total: u8) -> Self {
        Self {
            holder: holder.to_owned(),
            threshold,
            total,
            manifest_b64: None,
        }
    }

    /// Embed the ciphertext for single-file recovery.
    pub fn with_manifest(mut self, manifest: &[u8]) -> Self {
        self.manifest_b64 = Some(STANDARD.encode(manifest));
        self
    }
}

/// Emit `recover.html`. `personalization == None` produces the generic
/// page (`window.PERSONALIZATION = null;`).
pub fn render_recover_page(
    cfg: &PageConfig,
    personalization: Option<&Personalization>,
) -> anyhow::Result<String> {
    let personalization_js = match personalization {
        // serde_json::to_string emits a single line, which is what the
        // extractor's regex depends on.
        Some(p) => serde_json::to_string(p)?,
        None => "null".to_owned(),
    };

    let html = RECOVER_TEMPLATE
        .replacen("{{STYLES}}", STYLES_CSS, 1)
        .replacen("{{WASM_EXEC}}", WASM_EXEC_JS, 1)
        .replacen("{{PERSONALIZATION}}", &personalization_js, 1)
        .replacen("{{WASM_BASE64}}", &STANDARD.encode(&cfg.wasm_bytes), 1)
        .replacen("{{APP_JS}}", APP_JS, 1)
        .replace("{{VERSION}}", &cfg.version)
        .replace("{{GITHUB_URL}}", &cfg.github_url);

    Ok(html)
}

/// Emit `rememory.html`, the sealer-side creation page.
pub fn render_create_page(cfg: &PageConfig) -> String {
    CREATE_TEMPLATE
        .replacen("{{STYLES}}", STYLES_CSS, 1)
        .replacen("{{WASM_EXEC}}", WASM_EXEC_JS, 1)
        .replacen("{{WASM_BASE64}}", &STANDARD.encode(&cfg.wasm_bytes), 1)
        .replacen("{{CREATE_APP_JS}}", CREATE_APP_JS, 1)
        .replace("{{VERSION}}", &cfg.version)
        .replace("{{GITHUB_URL}}", &cfg.github_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_manifest, ExtractError};

    fn test_cfg() -> PageConfig {
        PageConfig {
            version: "0.4.2".into(),
            github_url: "https://github.com/tinyland-inc/rememory/releases/tag/v0.4.2".into(),
            wasm_bytes: vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00],
        }
    }

    #[test]
    fn all_tokens_substituted() {
        let p = Personalization::new("Alice", 2, 3);
        let html = render_recover_page(&test_cfg(), Some(&p)).unwrap();
        assert!(!html.contains("{{"), "unsubstituted token left in page");
        assert!(html.contains("0.4.2"));
        assert!(html.contains("releases/tag/v0.4.2"));

        let create = render_create_page(&test_cfg());
        assert!(!create.contains("{{"), "unsubstituted token left in create page");
    }

    #[test]
    fn personalization_is_single_line_json() {
        let p = Personalization::new("Alice", 2, 3).with_manifest(b"ciphertext");
        let html = render_recover_page(&test_cfg(), Some(&p)).unwrap();

        let line = html
            .lines()
            .find(|l| l.contains("window.PERSONALIZATION"))
            .expect("personalization line present");
        assert!(line.contains(r#""holder":"Alice""#));
        assert!(line.contains("manifestB64"));
    }

    #[test]
    fn personalized_page_roundtrips_manifest() {
        let ct = b"the encrypted manifest bytes";
        let p = Personalization::new("Bob", 3, 5).with_manifest(ct);
        let html = render_recover_page(&test_cfg(), Some(&p)).unwrap();

        assert_eq!(extract_manifest(html.as_bytes()).unwrap(), ct);
    }

    #[test]
    fn generic_page_has_no_personalization() {
        let html = render_recover_page(&test_cfg(), None).unwrap();
        assert!(html.contains("window.PERSONALIZATION = null;"));
        assert!(matches!(
            extract_manifest(html.as_bytes()),
            Err(ExtractError::NoPersonalization)
        ));
    }

    #[test]
    fn opting_out_of_embedding_is_detectable() {
        let p = Personalization::new("Alice", 2, 3);
        let html = render_recover_page(&test_cfg(), Some(&p)).unwrap();
        assert!(matches!(
            extract_manifest(html.as_bytes()),
            Err(ExtractError::NoEmbeddedManifest)
        ));
    }

    #[test]
    fn wasm_is_embedded_base64() {
        let cfg = test_cfg();
        let html = render_recover_page(&cfg, None).unwrap();
        assert!(html.contains(&STANDARD.encode(&cfg.wasm_bytes)));
    }
}
