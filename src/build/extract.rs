//! Tarball extraction into the work directory.

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Extract the gzip tarball at `archive` into `work_dir`.
///
/// The archive must unpack to `<work_dir>/<source_dir>` containing an
/// executable `configure` script. A stale tree from a previous run is
/// replaced.
pub fn extract_archive(archive: &Path, work_dir: &Path, source_dir: &str) -> Result<PathBuf> {
    if !archive.is_file() {
        bail!("archive not found at: {}", archive.display());
    }

    let dest = work_dir.join(source_dir);
    if dest.exists() {
        println!("  Replacing stale source tree at {}", dest.display());
        fs::remove_dir_all(&dest)
            .with_context(|| format!("removing stale source tree '{}'", dest.display()))?;
    }

    fs::create_dir_all(work_dir)
        .with_context(|| format!("creating work directory '{}'", work_dir.display()))?;

    let file = File::open(archive)
        .with_context(|| format!("opening archive '{}'", archive.display()))?;
    let decoder = MultiGzDecoder::new(BufReader::new(file));
    let mut tarball = tar::Archive::new(decoder);
    tarball.unpack(work_dir).with_context(|| {
        format!(
            "extracting '{}' into '{}' (invalid gzip or tar format?)",
            archive.display(),
            work_dir.display()
        )
    })?;

    if !dest.is_dir() {
        bail!(
            "archive did not contain the expected '{}/' directory: {}",
            source_dir,
            archive.display()
        );
    }

    ensure_configure_script(&dest)?;

    println!("  Extracted source tree to {}", dest.display());
    Ok(dest)
}

/// A source tree is only buildable if its configure script survived
/// extraction intact.
fn ensure_configure_script(source_tree: &Path) -> Result<()> {
    let configure = source_tree.join("configure");
    if !configure.is_file() {
        bail!(
            "invalid source tree - no configure script found in {}",
            source_tree.display()
        );
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&configure)
            .with_context(|| format!("reading metadata for '{}'", configure.display()))?
            .permissions()
            .mode();
        if mode & 0o111 == 0 {
            bail!(
                "configure script is not executable: {}",
                configure.display()
            );
        }
    }

    Ok(())
}
