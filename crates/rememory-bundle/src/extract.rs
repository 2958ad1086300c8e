//! Recovering the embedded ciphertext from a personalized recovery page.
//!
//! A personalized `recover.html` carries a single line
//! `window.PERSONALIZATION = {...};` whose JSON object may include
//! `manifestB64`, the standard-base64 ciphertext. That makes the page
//! itself a recoverable artifact: extract, decode, feed to a session.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::bytes::Regex;
use serde::Deserialize;
use thiserror::Error;

static PERSONALIZATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.PERSONALIZATION\s*=\s*(\{[^\n]*\})\s*;").expect("static pattern"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no personalization data found in page")]
    NoPersonalization,

    #[error("parsing personalization JSON: {0}")]
    BadJson(String),

    #[error("no embedded manifest in page (manifestB64 is absent)")]
    NoEmbeddedManifest,

    #[error("decoding manifest base64: {0}")]
    BadBase64(String),
}

/// The subset of the personalization block this extractor cares about.
/// Unknown keys are forward-compatible and ignored.
#[derive(Debug, Deserialize)]
struct PersonalizationManifest {
    #[serde(default, rename = "manifestB64")]
    manifest_b64: String,
}

/// Extract the `MANIFEST.age` bytes embedded in a personalized recovery
/// page.
pub fn extract_manifest(html: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let captures = PERSONALIZATION_RE
        .captures(html)
        .ok_or(ExtractError::NoPersonalization)?;
    let json = captures.get(1).ok_or(ExtractError::NoPersonalization)?;

    let parsed: PersonalizationManifest =
        serde_json::from_slice(json.as_bytes()).map_err(|e| ExtractError::BadJson(e.to_string()))?;

    if parsed.manifest_b64.is_empty() {
        return Err(ExtractError::NoEmbeddedManifest);
    }

    STANDARD
        .decode(parsed.manifest_b64.as_bytes())
        .map_err(|e| ExtractError::BadBase64(e.to_string()))
}
