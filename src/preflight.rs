//! Preflight checks for bootstrap validation.
//!
//! Validates the host before any download or build starts. This prevents
//! cryptic errors halfway through a compile and avoids deleting evidence of
//! what went wrong.
//!
//! # Example
//!
//! ```rust,ignore
//! use talib_bootstrap::preflight::{check_required_tools, REQUIRED_TOOLS};
//!
//! if let Err(e) = check_required_tools(REQUIRED_TOOLS) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Context, Result};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Env var overriding pip resolution (path to a pip executable).
pub const PIP_BIN_ENV: &str = "TALIB_BOOTSTRAP_PIP";

/// Required host tools for the native TA-Lib build.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("sh", "sh"),
    ("make", "make"),
    ("cc", "gcc"),
];

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// # Arguments
///
/// * `tools` - Slice of (command, package) tuples
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check that all tools needed to compile TA-Lib are available.
///
/// This checks all tools in [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

/// A resolved pip invocation: the program plus any leading arguments
/// (e.g. `python3 -m pip`).
#[derive(Debug, Clone)]
pub struct PipInvocation {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl PipInvocation {
    fn bare(program: PathBuf) -> Self {
        Self {
            program,
            leading_args: Vec::new(),
        }
    }

    /// Human-readable form, e.g. "python3 -m pip".
    pub fn describe(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.leading_args.iter().cloned());
        parts.join(" ")
    }

    /// Start a [`Cmd`] for this invocation.
    pub fn cmd(&self) -> Cmd {
        Cmd::new(&self.program).args(self.leading_args.clone())
    }
}

/// Find a usable pip invocation.
///
/// Resolution order:
/// 1. `TALIB_BOOTSTRAP_PIP` env var (path to a pip executable)
/// 2. `python3 -m pip`
/// 3. `pip3` on PATH
/// 4. `pip` on PATH
pub fn resolve_pip() -> Result<PipInvocation> {
    if let Ok(bin_path) = env::var(PIP_BIN_ENV) {
        let path = PathBuf::from(&bin_path);
        if path.is_file() {
            return Ok(PipInvocation::bare(path));
        }
        bail!("{} points to non-existent path: {}", PIP_BIN_ENV, bin_path);
    }

    if let Ok(python3) = which::which("python3") {
        return Ok(PipInvocation {
            program: python3,
            leading_args: vec!["-m".to_string(), "pip".to_string()],
        });
    }

    if let Ok(pip3) = which::which("pip3") {
        return Ok(PipInvocation::bare(pip3));
    }

    if let Ok(pip) = which::which("pip") {
        return Ok(PipInvocation::bare(pip));
    }

    bail!(
        "Could not find a pip installation.\n\n\
         Resolution order tried:\n\
         1. {} env var - not set\n\
         2. python3 -m pip - python3 not found\n\
         3. pip3 - not found\n\
         4. pip - not found\n\n\
         Solutions:\n\
         - Install Python 3 with pip\n\
         - Set {}=/path/to/pip",
        PIP_BIN_ENV,
        PIP_BIN_ENV
    )
}

/// Check that the install prefix is writable by the current user.
///
/// Probes the closest existing ancestor of the prefix with a marker file, so
/// a system prefix like `/usr` fails early with a clear diagnostic instead of
/// letting `make install` die halfway through copying files.
pub fn check_prefix_writable(prefix: &Path) -> Result<()> {
    let probe_dir = closest_existing_dir(prefix);
    let marker = probe_dir.join(".talib-bootstrap-write-probe");

    // Stale marker from an interrupted run.
    let _ = fs::remove_file(&marker);

    match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(_) => {
            let _ = fs::remove_file(&marker);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            let euid = unsafe { libc::geteuid() };
            bail!(
                "install prefix '{}' is not writable (effective uid {}).\n\
                 Re-run with elevated privileges, or set talib.prefix to a \
                 user-writable location such as ~/.local.",
                prefix.display(),
                euid
            )
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "probing install prefix '{}' for write access (marker '{}')",
                prefix.display(),
                marker.display()
            )
        }),
    }
}

/// Walk up from `path` to the closest directory that exists.
fn closest_existing_dir(path: &Path) -> &Path {
    for candidate in path.ancestors() {
        if candidate.is_dir() {
            return candidate;
        }
    }
    Path::new("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'ls' should exist on any Unix system
        assert!(command_exists("ls"));
        // Random garbage should not exist
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = &[("ls", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_failure_lists_packages() {
        let tools = &[("nonexistent_command_xyz", "fake-package")];
        let err = check_required_tools(tools).unwrap_err();
        assert!(format!("{}", err).contains("fake-package"));
    }

    #[test]
    fn writable_prefix_passes_probe() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(check_prefix_writable(temp_dir.path()).is_ok());
        // Probe must not leave a marker behind.
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_prefix_probes_nearest_ancestor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let prefix = temp_dir.path().join("opt/ta-lib");
        assert_eq!(closest_existing_dir(&prefix), temp_dir.path());
        assert!(check_prefix_writable(&prefix).is_ok());
    }

    #[test]
    fn pip_invocation_describe_includes_leading_args() {
        let pip = PipInvocation {
            program: PathBuf::from("python3"),
            leading_args: vec!["-m".to_string(), "pip".to_string()],
        };
        assert_eq!(pip.describe(), "python3 -m pip");
    }
}
