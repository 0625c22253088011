//! TA-Lib configure/make/install.
//!
//! Drives the library's autotools build with an explicit install prefix.
//!
//! # Usage
//!
//! ```rust,ignore
//! use talib_bootstrap::build::native::{build_and_install, is_installed};
//!
//! if !is_installed(&prefix) {
//!     build_and_install(&source_tree, &prefix, None)?;
//! }
//! ```

use anyhow::{bail, Result};
use std::path::Path;

use crate::process::Cmd;

/// Relative path of the TA-Lib umbrella header under the prefix.
const HEADER_REL: &str = "include/ta-lib/ta_libc.h";

/// Installed library filename stem (`libta_lib.a`, `libta_lib.so.*`, …).
const LIB_STEM: &str = "libta_lib";

/// Whether the build ran or was skipped as already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Probe passed before building; nothing was done.
    AlreadyInstalled,
    /// The native build ran and installed the library.
    InstalledNow,
}

/// Check whether TA-Lib is already installed under `prefix`.
///
/// Both the umbrella header and a `libta_lib.*` under `lib/` must be present.
pub fn is_installed(prefix: &Path) -> bool {
    if !prefix.join(HEADER_REL).is_file() {
        return false;
    }
    installed_lib_present(prefix)
}

fn installed_lib_present(prefix: &Path) -> bool {
    let lib_dir = prefix.join("lib");
    let Ok(entries) = std::fs::read_dir(&lib_dir) else {
        return false;
    };
    for entry in entries.flatten() {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(LIB_STEM) {
                return true;
            }
        }
    }
    false
}

/// Run the three-stage native build inside `source_tree`.
///
/// # Arguments
/// * `source_tree` - Extracted TA-Lib source (must have a configure script)
/// * `prefix` - Install prefix passed to configure
/// * `jobs` - Parallel make jobs; `None` autodetects from the host CPU count
pub fn build_and_install(source_tree: &Path, prefix: &Path, jobs: Option<usize>) -> Result<()> {
    println!("Building TA-Lib from {}...", source_tree.display());

    if !source_tree.join("configure").is_file() {
        bail!(
            "invalid source tree - no configure script found in {}",
            source_tree.display()
        );
    }

    println!("  Configuring with prefix {}...", prefix.display());
    Cmd::new("sh")
        .arg("configure")
        .arg(format!("--prefix={}", prefix.display()))
        .cwd(source_tree)
        .error_msg("TA-Lib configure failed")
        .run_interactive()?;

    let jobs = match jobs {
        Some(n) => n,
        None => match std::thread::available_parallelism() {
            Ok(n) => n.get(),
            Err(e) => {
                eprintln!("  [WARN] Could not detect CPU count ({}), using 4 cores", e);
                4
            }
        },
    };

    // Interactive - user sees compiler progress.
    println!("  Compiling with {} jobs...", jobs);
    Cmd::new("make")
        .arg(format!("-j{}", jobs))
        .cwd(source_tree)
        .error_msg("TA-Lib compilation failed")
        .run_interactive()?;

    println!("  Installing to {}...", prefix.display());
    Cmd::new("make")
        .arg("install")
        .cwd(source_tree)
        .error_msg("TA-Lib installation failed")
        .run_interactive()?;

    if !is_installed(prefix) {
        bail!(
            "make install finished but TA-Lib is not present under {}\n\
             Expected: {} and lib/{}*",
            prefix.display(),
            prefix.join(HEADER_REL).display(),
            LIB_STEM
        );
    }

    println!(
        "  Installed {} files under {}",
        count_installed_files(prefix),
        prefix.display()
    );

    Ok(())
}

/// Count TA-Lib files installed under the prefix (headers plus libraries).
pub fn count_installed_files(prefix: &Path) -> usize {
    let mut count = 0;
    let mut walk_errors = 0;

    for entry in walkdir::WalkDir::new(prefix.join("include/ta-lib")) {
        match entry {
            Ok(e) if e.file_type().is_file() => count += 1,
            Ok(_) => {}
            Err(e) => {
                walk_errors += 1;
                eprintln!("  [WARN] Error reading installed entry: {}", e);
            }
        }
    }

    if let Ok(entries) = std::fs::read_dir(prefix.join("lib")) {
        for entry in entries.flatten() {
            if entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(LIB_STEM))
                .unwrap_or(false)
            {
                count += 1;
            }
        }
    }

    if walk_errors > 0 {
        eprintln!(
            "  [WARN] {} errors encountered while counting installed files (count may be inaccurate)",
            walk_errors
        );
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_install(prefix: &Path) {
        let include = prefix.join("include/ta-lib");
        fs::create_dir_all(&include).unwrap();
        fs::write(include.join("ta_libc.h"), b"/* umbrella */\n").unwrap();
        fs::write(include.join("ta_func.h"), b"/* funcs */\n").unwrap();

        let lib = prefix.join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("libta_lib.a"), b"!<arch>\n").unwrap();
        fs::write(lib.join("libta_lib.so.0.0.0"), b"\x7fELF").unwrap();
    }

    #[test]
    fn probe_requires_header_and_library() {
        let temp_dir = tempfile::tempdir().unwrap();
        let prefix = temp_dir.path();
        assert!(!is_installed(prefix));

        fake_install(prefix);
        assert!(is_installed(prefix));
    }

    #[test]
    fn probe_fails_with_header_but_no_library() {
        let temp_dir = tempfile::tempdir().unwrap();
        let prefix = temp_dir.path();
        let include = prefix.join("include/ta-lib");
        fs::create_dir_all(&include).unwrap();
        fs::write(include.join("ta_libc.h"), b"").unwrap();

        assert!(!is_installed(prefix));
    }

    #[test]
    fn probe_ignores_unrelated_libraries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let prefix = temp_dir.path();
        fs::create_dir_all(prefix.join("include/ta-lib")).unwrap();
        fs::write(prefix.join("include/ta-lib/ta_libc.h"), b"").unwrap();
        fs::create_dir_all(prefix.join("lib")).unwrap();
        fs::write(prefix.join("lib/libm.so"), b"").unwrap();

        assert!(!is_installed(prefix));
    }

    #[test]
    fn installed_file_count_covers_headers_and_libs() {
        let temp_dir = tempfile::tempdir().unwrap();
        fake_install(temp_dir.path());
        // 2 headers + 2 library files
        assert_eq!(count_installed_files(temp_dir.path()), 4);
    }

    #[test]
    fn build_rejects_tree_without_configure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source_tree = temp_dir.path().join("ta-lib");
        fs::create_dir_all(&source_tree).unwrap();

        let err =
            build_and_install(&source_tree, &temp_dir.path().join("prefix"), Some(1)).unwrap_err();
        assert!(format!("{}", err).contains("configure"));
    }
}
