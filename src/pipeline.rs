//! Bootstrap pipeline orchestration.
//!
//! Owns stage ordering, the run lock, the cleanup-on-success policy, and the
//! JSON receipt. Stages run strictly in order and the first failure aborts
//! the run; a failed build leaves its archive and source tree in the work
//! directory for inspection.

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use crate::build::native::{self, BuildOutcome};
use crate::build::extract;
use crate::cleanup;
use crate::config::BootstrapConfig;
use crate::deps;
use crate::fetch;
use crate::preflight::{self, PipInvocation};
use crate::process::ensure_exists;

const LOCK_FILENAME: &str = ".bootstrap.lock";
const RECEIPT_FILENAME: &str = "bootstrap-receipt.json";

/// Record of a successful bootstrap run, written into the work dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReceipt {
    pub talib_version: String,
    pub install_prefix: String,
    pub build: String,
    pub installed_files: usize,
    pub python_packages: usize,
    pub started_at_utc: String,
    pub finished_at_utc: String,
}

/// Path of the receipt within a work dir.
pub fn receipt_path(work_dir: &Path) -> PathBuf {
    work_dir.join(RECEIPT_FILENAME)
}

/// Exclusive lock on the work dir, held for the duration of a run.
struct RunLock {
    _file: File,
}

fn acquire_run_lock(work_dir: &Path) -> Result<RunLock> {
    let lock_path = work_dir.join(LOCK_FILENAME);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("opening run lock '{}'", lock_path.display()))?;

    if file.try_lock_exclusive().is_err() {
        bail!(
            "another bootstrap run appears to be active (lock '{}' is held)",
            lock_path.display()
        );
    }

    Ok(RunLock { _file: file })
}

/// Compact UTC timestamp, e.g. `20260808T142301Z`.
fn now_utc_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Run host validation and return the resolved pip invocation.
///
/// The prefix write probe only runs when a native build is expected; a
/// dependencies-only re-run must not demand write access to `/usr`.
fn run_preflight(config: &BootstrapConfig, needs_prefix_write: bool) -> Result<PipInvocation> {
    preflight::check_host_tools()?;
    let pip = preflight::resolve_pip()?;
    ensure_exists(&config.manifest, "Requirements manifest")?;
    if needs_prefix_write {
        preflight::check_prefix_writable(&config.prefix)?;
    }
    Ok(pip)
}

/// `preflight` subcommand: validate everything a full install would need.
pub fn preflight(config: &BootstrapConfig) -> Result<()> {
    println!("[bootstrap:preflight] checking host for TA-Lib {}", config.version);
    let pip = run_preflight(config, true)?;
    println!("[bootstrap:preflight] ok; pip resolved to '{}'", pip.describe());
    Ok(())
}

/// `fetch` subcommand: download and verify the archive, nothing more.
pub fn fetch(config: &BootstrapConfig) -> Result<PathBuf> {
    let archive = config.archive_path();
    println!("[bootstrap:fetch] fetching TA-Lib {}", config.version);
    fetch::ensure_archive(&config.archive_url(), &archive, config.sha256.as_deref())
        .with_context(|| format!("fetching TA-Lib {}", config.version))?;
    Ok(archive)
}

/// `clean` subcommand: remove leftover artifacts from any previous run.
pub fn clean(config: &BootstrapConfig) -> Result<()> {
    println!("[bootstrap:clean] removing transient artifacts");
    cleanup::remove_build_artifacts(&config.archive_path(), &config.source_tree())
}

/// Full bootstrap: preflight, fetch, build, cleanup, Python dependencies.
pub fn install(config: &BootstrapConfig) -> Result<()> {
    fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("creating work directory '{}'", config.work_dir.display()))?;
    let _lock = acquire_run_lock(&config.work_dir)?;
    let started_at_utc = now_utc_compact();

    let build_needed = config.force || !native::is_installed(&config.prefix);

    println!("[bootstrap:preflight] checking host for TA-Lib {}", config.version);
    let pip = run_preflight(config, build_needed)?;

    let outcome = if build_needed {
        println!("[bootstrap:fetch] fetching TA-Lib {}", config.version);
        fetch::ensure_archive(
            &config.archive_url(),
            &config.archive_path(),
            config.sha256.as_deref(),
        )
        .with_context(|| format!("fetching TA-Lib {}", config.version))?;

        println!("[bootstrap:extract] unpacking into {}", config.work_dir.display());
        let source_tree =
            extract::extract_archive(&config.archive_path(), &config.work_dir, &config.source_dir)
                .with_context(|| format!("extracting TA-Lib {}", config.version))?;

        println!("[bootstrap:build] configure / make / make install");
        native::build_and_install(&source_tree, &config.prefix, config.jobs)
            .with_context(|| format!("building TA-Lib {}", config.version))?;

        // Artifacts are only disposable once the install is verified.
        if config.keep_artifacts {
            println!("[bootstrap:cleanup] keeping build artifacts (keep_artifacts = true)");
        } else {
            println!("[bootstrap:cleanup] removing transient artifacts");
            cleanup::remove_build_artifacts(&config.archive_path(), &source_tree)?;
        }

        BuildOutcome::InstalledNow
    } else {
        println!(
            "[bootstrap:build] TA-Lib already installed under {} (use force = true to rebuild)",
            config.prefix.display()
        );
        BuildOutcome::AlreadyInstalled
    };

    println!("[bootstrap:deps] installing Python dependencies via '{}'", pip.describe());
    let python_packages = deps::install_dependencies(&pip, &config.manifest, config.upgrade_pip)
        .with_context(|| {
            format!(
                "installing dependencies from '{}'",
                config.manifest.display()
            )
        })?;

    let receipt = RunReceipt {
        talib_version: config.version.clone(),
        install_prefix: config.prefix.display().to_string(),
        build: match outcome {
            BuildOutcome::AlreadyInstalled => "already-installed".to_string(),
            BuildOutcome::InstalledNow => "installed".to_string(),
        },
        installed_files: native::count_installed_files(&config.prefix),
        python_packages,
        started_at_utc,
        finished_at_utc: now_utc_compact(),
    };
    write_receipt(&config.work_dir, &receipt)?;

    println!(
        "[bootstrap] done; TA-Lib {} under {} and {} Python packages from {}",
        config.version,
        config.prefix.display(),
        python_packages,
        config.manifest.display()
    );

    Ok(())
}

fn write_receipt(work_dir: &Path, receipt: &RunReceipt) -> Result<()> {
    let path = receipt_path(work_dir);
    let json = serde_json::to_string_pretty(receipt).context("serializing run receipt")?;
    fs::write(&path, json)
        .with_context(|| format!("writing run receipt '{}'", path.display()))?;
    Ok(())
}

/// Load the receipt of the last successful run, if any.
pub fn load_receipt(work_dir: &Path) -> Result<Option<RunReceipt>> {
    let path = receipt_path(work_dir);
    if !path.is_file() {
        return Ok(None);
    }
    let bytes =
        fs::read(&path).with_context(|| format!("reading run receipt '{}'", path.display()))?;
    let receipt: RunReceipt = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing run receipt '{}'", path.display()))?;
    Ok(Some(receipt))
}
