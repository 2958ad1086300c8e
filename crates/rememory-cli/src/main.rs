//! rememory: seal files for trusted holders, recover with a quorum.
//!
//! Commands:
//!   init            - create a project (holders, N-of-K)
//!   seal            - archive + encrypt the files, split the passphrase
//!   bundle          - build one distributable ZIP per holder
//!   status          - show project and artifact state
//!   verify-bundle   - structurally check a bundle ZIP
//!   recover         - combine shares + manifest back into files
//!   html            - emit standalone recover/create pages

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use rememory_bundle::{
    build_bundle, extract_manifest, open_bundle, render_create_page, render_recover_page,
    verify_bundle, BundleConfig, BundleRequest, PageConfig,
};
use rememory_core::{ArchiveFile, RecoverSession, SealOptions};

mod project;
use project::Project;

const GITHUB_REPO: &str = "https://github.com/tinyland-inc/rememory";

// ── CLI structure ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "rememory",
    version,
    about = "Zero-infrastructure inheritance for your files",
    long_about = "rememory seals a directory of files into an encrypted manifest and a set \
                  of shares. Distribute one share per holder; any quorum of them can later \
                  recover the files with nothing but a web browser."
)]
struct Cli {
    /// Project directory (default: discovered upward from the working dir)
    #[arg(long, short = 'C', env = "REMEMORY_PROJECT", global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new project in the current directory
    Init {
        /// Project name, shown in holder READMEs
        #[arg(long)]
        name: String,
        /// Holder as "Name" or "Name:contact"; repeat once per holder
        #[arg(long = "holder", required = true)]
        holders: Vec<String>,
        /// Shares required to recover (K)
        #[arg(long, short = 'k')]
        threshold: usize,
    },

    /// Seal the project files: archive, encrypt, split
    Seal {
        /// Directory to seal (default: <project>/files)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Explicit passphrase (a fresh one is generated when absent)
        #[arg(long, env = "REMEMORY_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
        /// Prompt for the passphrase instead of generating one
        #[arg(long, conflicts_with = "passphrase")]
        prompt_passphrase: bool,
    },

    /// Build one distribution bundle per holder
    Bundle {
        /// Skip embedding MANIFEST.age into recover.html (smaller bundles)
        #[arg(long)]
        no_embed_manifest: bool,
        /// Omit the co-holder contact list from READMEs
        #[arg(long)]
        anonymous: bool,
        /// Compiled recovery module for the offline page
        #[arg(long, env = "REMEMORY_WASM")]
        wasm: PathBuf,
    },

    /// Show project state and artifact checksums
    Status,

    /// Structurally verify a bundle ZIP
    #[command(name = "verify-bundle")]
    VerifyBundle {
        /// Path to a bundle-<holder>.zip
        bundle: PathBuf,
    },

    /// Recover files from shares and a manifest
    Recover {
        /// Share input: a SHARE-*.txt, a README.txt, or a bundle ZIP; repeat
        #[arg(long = "share", required = true)]
        shares: Vec<PathBuf>,
        /// MANIFEST.age or a personalized recover.html (optional when a
        /// bundle ZIP among the shares carries it)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Where to write the recovered files
        #[arg(long, short = 'o', default_value = "recovered")]
        out: PathBuf,
    },

    /// Emit standalone HTML pages for static hosting
    Html {
        #[command(subcommand)]
        which: HtmlPage,
    },
}

#[derive(Subcommand, Debug)]
enum HtmlPage {
    /// Generic recovery page (no personalization)
    Recover {
        /// Output path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Compiled recovery module to embed
        #[arg(long, env = "REMEMORY_WASM")]
        wasm: PathBuf,
    },
    /// Sealer-side creation page
    Create {
        /// Output path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Compiled recovery module to embed
        #[arg(long, env = "REMEMORY_WASM")]
        wasm: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { name, holders, threshold } => cmd_init(&name, &holders, threshold),
        Commands::Seal { dir, passphrase, prompt_passphrase } => {
            let project_dir = resolve_project_dir(cli.project.as_deref())?;
            cmd_seal(&project_dir, dir.as_deref(), passphrase, prompt_passphrase)
        }
        Commands::Bundle { no_embed_manifest, anonymous, wasm } => {
            let project_dir = resolve_project_dir(cli.project.as_deref())?;
            cmd_bundle(&project_dir, no_embed_manifest, anonymous, &wasm)
        }
        Commands::Status => {
            let project_dir = resolve_project_dir(cli.project.as_deref())?;
            cmd_status(&project_dir)
        }
        Commands::VerifyBundle { bundle } => cmd_verify_bundle(&bundle),
        Commands::Recover { shares, manifest, out } => {
            cmd_recover(&shares, manifest.as_deref(), &out)
        }
        Commands::Html { which } => match which {
            HtmlPage::Recover { output, wasm } => cmd_html(false, output.as_deref(), &wasm),
            HtmlPage::Create { output, wasm } => cmd_html(true, output.as_deref(), &wasm),
        },
    }
}

fn resolve_project_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        if !dir.join(project::PROJECT_FILE).is_file() {
            bail!("no {} in {}", project::PROJECT_FILE, dir.display());
        }
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("getting current directory")?;
    project::find_project_dir(&cwd)
        .context("no rememory project found (run 'rememory init' first)")
}

fn release_url() -> String {
    format!("{GITHUB_REPO}/releases/tag/v{}", env!("CARGO_PKG_VERSION"))
}

// ── `rememory init` ───────────────────────────────────────────────────────────

fn cmd_init(name: &str, holder_specs: &[String], threshold: usize) -> Result<()> {
    let cwd = std::env::current_dir().context("getting current directory")?;
    if cwd.join(project::PROJECT_FILE).exists() {
        bail!("{} already exists here", project::PROJECT_FILE);
    }

    let holders: Vec<project::HolderEntry> = holder_specs
        .iter()
        .map(|spec| {
            let (name, contact) = match spec.split_once(':') {
                Some((n, c)) => (n.trim(), Some(c.trim().to_owned())),
                None => (spec.trim(), None),
            };
            if name.is_empty() {
                bail!("holder name must not be empty (got {spec:?})");
            }
            Ok(project::HolderEntry { name: name.to_owned(), contact })
        })
        .collect::<Result<_>>()?;

    let p = Project {
        name: name.to_owned(),
        total: holders.len(),
        threshold,
        holders,
        sealed: None,
    };
    p.validate()?;
    p.save(&cwd)?;

    std::fs::create_dir_all(project::files_path(&cwd)).context("creating files/")?;

    println!("Created project {:?} ({}-of-{})", p.name, p.threshold, p.total);
    for h in &p.holders {
        match &h.contact {
            Some(c) => println!("  holder: {} ({c})", h.name),
            None => println!("  holder: {}", h.name),
        }
    }
    println!();
    println!("Next steps:");
    println!("  1. Put the files to protect into files/");
    println!("  2. Run: rememory seal");
    println!("  3. Run: rememory bundle");

    Ok(())
}

// ── `rememory seal` ───────────────────────────────────────────────────────────

fn cmd_seal(
    project_dir: &Path,
    dir_override: Option<&Path>,
    passphrase: Option<String>,
    prompt_passphrase: bool,
) -> Result<()> {
    let mut p = Project::load(project_dir)?;
    p.validate()?;

    let input_dir = dir_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project::files_path(project_dir));
    let files = read_dir_files(&input_dir)?;
    if files.is_empty() {
        bail!("nothing to seal in {}", input_dir.display());
    }

    let passphrase = if prompt_passphrase {
        let pass = rpassword::prompt_password("Passphrase: ")
            .context("failed to read passphrase")?;
        let confirm = rpassword::prompt_password("Confirm passphrase: ")
            .context("failed to read confirmation")?;
        if pass != confirm {
            bail!("passphrases do not match");
        }
        Some(pass)
    } else {
        passphrase
    };

    println!(
        "Sealing {} files ({}) as {}-of-{}...",
        files.len(),
        fmt_bytes(files.iter().map(|f| f.data.len() as u64).sum()),
        p.threshold,
        p.total
    );

    let opts = SealOptions {
        passphrase,
        ..SealOptions::new(p.total, p.threshold)
    };
    let out = rememory_core::seal(&files, &p.holders(), &opts)?;

    // Only touch the filesystem after the self-test passed.
    let shares_dir = project::shares_path(project_dir);
    std::fs::create_dir_all(&shares_dir).context("creating output/shares/")?;

    let manifest_file = project::manifest_path(project_dir);
    std::fs::write(&manifest_file, &out.manifest)
        .with_context(|| format!("writing {}", manifest_file.display()))?;

    let mut share_files = Vec::with_capacity(out.shares.len());
    let mut seen_names = std::collections::HashSet::new();
    for share in &out.shares {
        let mut filename = share.filename();
        // Two holders can slug identically; disambiguate with the index.
        if !seen_names.insert(filename.clone()) {
            filename = filename.replace(".txt", &format!("-{}.txt", share.index));
            seen_names.insert(filename.clone());
        }
        let path = shares_dir.join(&filename);
        std::fs::write(&path, share.encode())
            .with_context(|| format!("writing {}", path.display()))?;
        share_files.push(filename);
    }

    let manifest_checksum = rememory_core::hash_bytes(&out.manifest);
    p.sealed = Some(project::SealedState {
        created: out.created,
        manifest_checksum: manifest_checksum.clone(),
        passphrase_fingerprint: out.passphrase_fingerprint.clone(),
        share_files: share_files.clone(),
    });
    p.save(project_dir)?;

    println!();
    println!("Sealed.");
    println!("  manifest:    {} ({})", manifest_file.display(), fmt_bytes(out.manifest.len() as u64));
    println!("  checksum:    {manifest_checksum}");
    println!("  fingerprint: {}", out.passphrase_fingerprint);
    for name in &share_files {
        println!("  share:       {}", shares_dir.join(name).display());
    }
    println!();
    println!("The passphrase is split across the shares and was not saved anywhere.");
    println!("Next: rememory bundle");

    Ok(())
}

/// Collect regular files under `dir` as archive entries with
/// forward-slash relative names, sorted for deterministic output.
fn read_dir_files(dir: &Path) -> Result<Vec<ArchiveFile>> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)
            .with_context(|| format!("reading {}", current.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let rel = path
                    .strip_prefix(dir)
                    .expect("entry is under the walk root")
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let data = std::fs::read(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                files.push(ArchiveFile { name: rel, data });
            }
            // Symlinks and specials stay out of the archive.
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

// ── `rememory bundle` ─────────────────────────────────────────────────────────

fn cmd_bundle(
    project_dir: &Path,
    no_embed_manifest: bool,
    anonymous: bool,
    wasm: &Path,
) -> Result<()> {
    let p = Project::load(project_dir)?;
    let Some(sealed) = &p.sealed else {
        bail!("project must be sealed before generating bundles (run 'rememory seal' first)");
    };

    let manifest_file = project::manifest_path(project_dir);
    let manifest = std::fs::read(&manifest_file)
        .with_context(|| format!("reading {}", manifest_file.display()))?;
    if !rememory_core::verify_hash(&rememory_core::hash_bytes(&manifest), &sealed.manifest_checksum)
    {
        bail!(
            "{} does not match the sealed checksum; re-run 'rememory seal'",
            manifest_file.display()
        );
    }

    let wasm_bytes = std::fs::read(wasm)
        .with_context(|| format!("reading recovery module: {}", wasm.display()))?;
    if wasm_bytes.is_empty() {
        bail!("recovery module {} is empty", wasm.display());
    }

    // Re-read the shares from disk; they are the single source of truth
    // after sealing.
    let shares_dir = project::shares_path(project_dir);
    let mut shares = Vec::with_capacity(sealed.share_files.len());
    for name in &sealed.share_files {
        let path = shares_dir.join(name);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        shares.push(
            rememory_core::share::parse_long(&text)
                .with_context(|| format!("parsing {}", path.display()))?,
        );
    }

    let holders = p.holders();
    let cfg = BundleConfig {
        version: env!("CARGO_PKG_VERSION").to_owned(),
        github_url: release_url(),
        wasm_bytes,
        embed_manifest: !no_embed_manifest,
        anonymous,
    };

    let bundles_dir = project::bundles_path(project_dir);
    std::fs::create_dir_all(&bundles_dir).context("creating output/bundles/")?;

    println!("Generating bundles for {} holders...\n", holders.len());

    let mut seen_names = std::collections::HashSet::new();
    for share in &shares {
        let idx = share.index as usize - 1;
        let holder = holders
            .get(idx)
            .with_context(|| format!("share index {} has no matching holder", share.index))?;
        let co_holders: Vec<_> = holders
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != idx)
            .map(|(_, h)| h.clone())
            .collect();

        let zip = build_bundle(
            &BundleRequest {
                project_name: &p.name,
                holder,
                share,
                co_holders: &co_holders,
                manifest: &manifest,
                readme_pdf: None,
                created: sealed.created,
            },
            &cfg,
        )
        .with_context(|| format!("building bundle for {}", holder.name))?;

        let mut filename = rememory_core::names::bundle_filename(&holder.name, share.index);
        if !seen_names.insert(filename.clone()) {
            filename = filename.replace(".zip", &format!("-{}.zip", share.index));
            seen_names.insert(filename.clone());
        }
        let path = bundles_dir.join(&filename);
        std::fs::write(&path, &zip).with_context(|| format!("writing {}", path.display()))?;

        println!("  {} ({})", filename, fmt_bytes(zip.len() as u64));
    }

    println!();
    println!("Bundles saved to: {}", bundles_dir.display());
    println!("Each README contains that holder's share - remind them not to share it.");

    Ok(())
}

// ── `rememory status` ─────────────────────────────────────────────────────────

fn cmd_status(project_dir: &Path) -> Result<()> {
    let p = Project::load(project_dir)?;

    println!("Project: {} ({}-of-{})", p.name, p.threshold, p.total);
    println!("  dir: {}", project_dir.display());
    for h in &p.holders {
        match &h.contact {
            Some(c) => println!("  holder: {} ({c})", h.name),
            None => println!("  holder: {}", h.name),
        }
    }
    println!();

    match &p.sealed {
        None => println!("Not sealed yet. Run: rememory seal"),
        Some(sealed) => {
            println!("Sealed at {}", sealed.created.to_rfc3339());
            println!("  fingerprint: {}", sealed.passphrase_fingerprint);

            let manifest_file = project::manifest_path(project_dir);
            if manifest_file.is_file() {
                let on_disk = hash_file(&manifest_file)?;
                let ok = rememory_core::verify_hash(&on_disk, &sealed.manifest_checksum);
                println!(
                    "  manifest:    {} [{}]",
                    manifest_file.display(),
                    if ok { "ok" } else { "CHECKSUM MISMATCH" }
                );
            } else {
                println!("  manifest:    MISSING ({})", manifest_file.display());
            }

            let shares_dir = project::shares_path(project_dir);
            for name in &sealed.share_files {
                let present = shares_dir.join(name).is_file();
                println!(
                    "  share:       {} [{}]",
                    name,
                    if present { "ok" } else { "MISSING" }
                );
            }

            let bundles_dir = project::bundles_path(project_dir);
            match std::fs::read_dir(&bundles_dir) {
                Ok(entries) => {
                    let count = entries.filter_map(|e| e.ok()).count();
                    println!("  bundles:     {count} in {}", bundles_dir.display());
                }
                Err(_) => println!("  bundles:     none (run 'rememory bundle')"),
            }
        }
    }

    Ok(())
}

/// Stream a file through SHA-256; agrees with `hash_bytes` on content.
fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

// ── `rememory verify-bundle` ──────────────────────────────────────────────────

fn cmd_verify_bundle(bundle_path: &Path) -> Result<()> {
    let bytes = std::fs::read(bundle_path)
        .with_context(|| format!("reading {}", bundle_path.display()))?;
    let report = verify_bundle(&bytes)?;

    println!("Bundle OK: {}", bundle_path.display());
    println!(
        "  holder:    {}",
        if report.holder.is_empty() { "(unnamed)" } else { &report.holder }
    );
    println!(
        "  share:     {} of {} (threshold {})",
        report.index, report.total, report.threshold
    );
    println!("  manifest:  {}", report.manifest_checksum);
    println!("  page:      {}", report.recover_checksum);
    println!(
        "  embedded:  {}",
        if report.manifest_embedded {
            "manifest embedded in recover.html (verified identical)"
        } else {
            "manifest NOT embedded (holders need MANIFEST.age)"
        }
    );
    if report.has_pdf {
        println!("  pdf:       README.pdf present");
    }

    Ok(())
}

// ── `rememory recover` ────────────────────────────────────────────────────────

fn cmd_recover(share_paths: &[PathBuf], manifest: Option<&Path>, out: &Path) -> Result<()> {
    let mut session = RecoverSession::new();

    for path in share_paths {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        if bytes.starts_with(b"PK\x03\x04") {
            // A whole bundle: take its share, and its manifest if we
            // don't have one yet.
            let contents = open_bundle(&bytes)
                .with_context(|| format!("opening bundle {}", path.display()))?;
            let (share, progress) = session
                .add_share(&contents.readme)
                .with_context(|| format!("share from {}", path.display()))?;
            if !session.has_ciphertext() {
                session.set_ciphertext(contents.manifest);
            }
            report_added(&share, progress);
        } else {
            let text = String::from_utf8(bytes)
                .with_context(|| format!("{} is not text or a bundle ZIP", path.display()))?;
            let (share, progress) = session
                .add_share(&text)
                .with_context(|| format!("share from {}", path.display()))?;
            report_added(&share, progress);
        }
    }

    if let Some(path) = manifest {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        session.set_ciphertext(resolve_manifest(bytes, path)?);
    }

    if !session.has_ciphertext() {
        bail!("no manifest: pass --manifest or include a bundle ZIP among the shares");
    }

    let files = session.recover()?;

    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    for file in &files {
        let dest = out.join(&file.name);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&dest, &file.data)
            .with_context(|| format!("writing {}", dest.display()))?;
        println!("  {} ({})", dest.display(), fmt_bytes(file.data.len() as u64));
    }

    println!();
    println!("Recovered {} files into {}", files.len(), out.display());
    Ok(())
}

fn report_added(share: &rememory_core::Share, progress: rememory_core::Progress) {
    let holder = if share.holder.is_empty() {
        format!("share {}", share.index)
    } else {
        share.holder.clone()
    };
    println!(
        "  accepted {} ({} of {} needed)",
        holder, progress.collected, progress.threshold
    );
}

/// Accept MANIFEST.age bytes directly, or pull the embedded copy out of a
/// personalized recover.html.
fn resolve_manifest(bytes: Vec<u8>, path: &Path) -> Result<Vec<u8>> {
    let looks_like_html = bytes.starts_with(b"<!DOCTYPE") || bytes.starts_with(b"<html");
    if looks_like_html {
        return extract_manifest(&bytes)
            .with_context(|| format!("extracting manifest from {}", path.display()));
    }
    Ok(bytes)
}

// ── `rememory html` ───────────────────────────────────────────────────────────

fn cmd_html(create: bool, output: Option<&Path>, wasm: &Path) -> Result<()> {
    let wasm_bytes = std::fs::read(wasm)
        .with_context(|| format!("reading recovery module: {}", wasm.display()))?;
    if wasm_bytes.is_empty() {
        bail!("recovery module {} is empty", wasm.display());
    }

    let cfg = PageConfig {
        version: env!("CARGO_PKG_VERSION").to_owned(),
        github_url: release_url(),
        wasm_bytes,
    };

    let content = if create {
        render_create_page(&cfg)
    } else {
        render_recover_page(&cfg, None)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Generated {} ({})", path.display(), fmt_bytes(content.len() as u64));
        }
        None => {
            std::io::stdout()
                .write_all(content.as_bytes())
                .context("writing to stdout")?;
        }
    }

    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
