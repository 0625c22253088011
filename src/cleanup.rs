//! Removal of transient build artifacts.
//!
//! Called by the pipeline only after a successful build, and unconditionally
//! by the `clean` subcommand. A failed build keeps its artifacts so the
//! operator can inspect what went wrong.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Remove the downloaded archive and the extracted source tree.
///
/// Missing paths are fine (nothing to do).
pub fn remove_build_artifacts(archive: &Path, source_tree: &Path) -> Result<()> {
    if archive.is_file() {
        fs::remove_file(archive)
            .with_context(|| format!("removing archive '{}'", archive.display()))?;
        println!("  Removed archive {}", archive.display());
    }

    if source_tree.is_dir() {
        fs::remove_dir_all(source_tree)
            .with_context(|| format!("removing source tree '{}'", source_tree.display()))?;
        println!("  Removed source tree {}", source_tree.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_archive_and_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("ta-lib-0.4.0-src.tar.gz");
        fs::write(&archive, b"tarball").unwrap();

        let tree = temp_dir.path().join("ta-lib");
        fs::create_dir_all(tree.join("src")).unwrap();
        fs::write(tree.join("src/ta_common.o"), b"obj").unwrap();

        remove_build_artifacts(&archive, &tree).unwrap();
        assert!(!archive.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn tolerates_already_clean_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("absent.tar.gz");
        let tree = temp_dir.path().join("absent-tree");

        assert!(remove_build_artifacts(&archive, &tree).is_ok());
    }

    #[test]
    fn leaves_unrelated_files_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("ta-lib-0.4.0-src.tar.gz");
        fs::write(&archive, b"tarball").unwrap();
        let keeper = temp_dir.path().join("bootstrap-receipt.json");
        fs::write(&keeper, b"{}").unwrap();

        remove_build_artifacts(&archive, &temp_dir.path().join("ta-lib")).unwrap();
        assert!(keeper.exists());
    }
}
