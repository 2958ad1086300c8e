//! The on-disk project: a `rememory.toml` at the project root plus an
//! `output/` directory for sealed artifacts.
//!
//! ```text
//! my-project/
//! ├── rememory.toml      name, holders, N/K, [sealed] record
//! ├── files/             what gets sealed (default input dir)
//! └── output/
//!     ├── MANIFEST.age
//!     ├── shares/SHARE-<slug>.txt
//!     └── bundles/bundle-<slug>.zip
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rememory_core::seal::Holder;

/// Project file name, discovered by walking up from the working directory.
pub const PROJECT_FILE: &str = "rememory.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Human name, shown in README documents.
    pub name: String,
    /// Total shares (N).
    pub total: usize,
    /// Shares required to recover (K).
    pub threshold: usize,
    pub holders: Vec<HolderEntry>,
    /// Present once `seal` has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sealed: Option<SealedState>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: "rememory project".into(),
            total: 0,
            threshold: 0,
            holders: Vec::new(),
            sealed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// Record of the last seal run. The passphrase itself is never written
/// anywhere; only its fingerprint is kept for sanity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedState {
    pub created: DateTime<Utc>,
    pub manifest_checksum: String,
    pub passphrase_fingerprint: String,
    #[serde(default)]
    pub share_files: Vec<String>,
}

impl Project {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(PROJECT_FILE);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading project file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing project file: {}", path.display()))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(PROJECT_FILE);
        let rendered = toml::to_string_pretty(self).context("serializing project")?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("writing project file: {}", path.display()))
    }

    /// Core holder list, index order.
    pub fn holders(&self) -> Vec<Holder> {
        self.holders
            .iter()
            .map(|h| Holder {
                name: h.name.clone(),
                contact: h.contact.clone(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.holders.len() != self.total {
            bail!(
                "project lists {} holders but total is {}",
                self.holders.len(),
                self.total
            );
        }
        rememory_core::shamir::validate_params(self.total, self.threshold)
            .context("project N/K parameters are invalid")?;
        Ok(())
    }
}

/// Default input directory for `seal`.
pub fn files_path(project_dir: &Path) -> PathBuf {
    project_dir.join("files")
}

pub fn output_path(project_dir: &Path) -> PathBuf {
    project_dir.join("output")
}

pub fn shares_path(project_dir: &Path) -> PathBuf {
    output_path(project_dir).join("shares")
}

pub fn bundles_path(project_dir: &Path) -> PathBuf {
    output_path(project_dir).join("bundles")
}

pub fn manifest_path(project_dir: &Path) -> PathBuf {
    output_path(project_dir).join("MANIFEST.age")
}

/// Walk upward from `start` until a directory containing `rememory.toml`
/// is found.
pub fn find_project_dir(start: &Path) -> Result<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(PROJECT_FILE).is_file() {
            return Ok(dir);
        }
        if !dir.pop() {
            bail!("no {PROJECT_FILE} found in {} or any parent", start.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_project() -> Project {
        Project {
            name: "Family Archive".into(),
            total: 3,
            threshold: 2,
            holders: vec![
                HolderEntry { name: "Alice".into(), contact: Some("alice@example.com".into()) },
                HolderEntry { name: "Bob".into(), contact: None },
                HolderEntry { name: "Carol".into(), contact: Some("+1 555 0100".into()) },
            ],
            sealed: None,
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let project = sample_project();
        project.save(tmp.path()).unwrap();

        let loaded = Project::load(tmp.path()).unwrap();
        assert_eq!(loaded.name, "Family Archive");
        assert_eq!(loaded.total, 3);
        assert_eq!(loaded.threshold, 2);
        assert_eq!(loaded.holders.len(), 3);
        assert_eq!(loaded.holders[0].contact.as_deref(), Some("alice@example.com"));
        assert!(loaded.sealed.is_none());
    }

    #[test]
    fn sealed_state_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let mut project = sample_project();
        project.sealed = Some(SealedState {
            created: Utc::now(),
            manifest_checksum: "sha256:abc".into(),
            passphrase_fingerprint: "sha256:def".into(),
            share_files: vec!["SHARE-alice.txt".into()],
        });
        project.save(tmp.path()).unwrap();

        let loaded = Project::load(tmp.path()).unwrap();
        let sealed = loaded.sealed.expect("sealed state persisted");
        assert_eq!(sealed.manifest_checksum, "sha256:abc");
        assert_eq!(sealed.share_files, vec!["SHARE-alice.txt"]);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
name = "minimal"
total = 2
threshold = 2

[[holders]]
name = "A"

[[holders]]
name = "B"
contact = "a@b.c"
"#;
        let project: Project = toml::from_str(toml_str).unwrap();
        assert_eq!(project.holders.len(), 2);
        assert!(project.validate().is_ok());
    }

    #[test]
    fn validate_catches_mismatches() {
        let mut project = sample_project();
        project.total = 4;
        assert!(project.validate().is_err());

        let mut project = sample_project();
        project.threshold = 1;
        assert!(project.validate().is_err());
    }

    #[test]
    fn find_walks_upward() {
        let tmp = TempDir::new().unwrap();
        sample_project().save(tmp.path()).unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_project_dir(&nested).unwrap();
        assert_eq!(found, tmp.path());

        let elsewhere = TempDir::new().unwrap();
        assert!(find_project_dir(elsewhere.path()).is_err());
    }
}
