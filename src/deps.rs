//! Python dependency installation from a requirements manifest.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::preflight::PipInvocation;
use crate::process::ensure_exists;

/// Read the manifest and return its requirement entries.
///
/// Blank lines and `#` comments are ignored. An empty manifest is an error:
/// running pip against it would report success while installing nothing.
pub fn load_manifest(path: &Path) -> Result<Vec<String>> {
    ensure_exists(path, "Requirements manifest")?;

    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading requirements manifest '{}'", path.display()))?;

    let entries: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if entries.is_empty() {
        bail!(
            "requirements manifest has no installable entries: {}",
            path.display()
        );
    }

    Ok(entries)
}

/// Upgrade pip itself to latest.
pub fn upgrade_pip(pip: &PipInvocation) -> Result<()> {
    println!("  Upgrading pip ({})...", pip.describe());
    pip.cmd()
        .args(["install", "--upgrade", "pip"])
        .error_msg("pip self-upgrade failed")
        .run_interactive()
}

/// Install every entry of the manifest in one pip run.
///
/// pip resolves ordering and conflicts itself; a non-zero exit means the
/// environment is incomplete and the whole bootstrap must report failure.
pub fn install_manifest(pip: &PipInvocation, manifest: &Path) -> Result<()> {
    pip.cmd()
        .arg("install")
        .arg("-r")
        .arg(manifest.display().to_string())
        .error_msg(format!(
            "dependency installation failed for manifest '{}'",
            manifest.display()
        ))
        .run_interactive()
}

/// Full dependency stage: validate the manifest, optionally upgrade pip,
/// install. Returns the number of manifest entries.
pub fn install_dependencies(
    pip: &PipInvocation,
    manifest: &Path,
    upgrade: bool,
) -> Result<usize> {
    let entries = load_manifest(manifest)?;
    println!(
        "  Installing {} dependencies from {}",
        entries.len(),
        manifest.display()
    );

    if upgrade {
        upgrade_pip(pip)?;
    }

    install_manifest(pip, manifest)?;
    Ok(entries.len())
}
