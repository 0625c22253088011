//! Archive retrieval with checksum-gated cache reuse.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

/// How the archive was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Freshly downloaded from the remote URL.
    Downloaded,
    /// An already-present archive passed verification and was reused.
    CachedReuse,
}

/// Make sure the archive is present at `dest` and verified.
///
/// An existing file is reused when it matches the pinned checksum (or is
/// merely non-empty when no checksum is pinned); otherwise it is replaced by
/// a fresh download. A download that fails verification is deleted.
pub fn ensure_archive(url: &str, dest: &Path, sha256: Option<&str>) -> Result<FetchOutcome> {
    if let Some(reason) = cached_archive_usable(dest, sha256)? {
        println!("  Reusing cached archive ({reason}): {}", dest.display());
        return Ok(FetchOutcome::CachedReuse);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating downloads directory '{}'", parent.display()))?;
    }

    println!("  Downloading {}", url);
    let content = download(url)?;

    // Stage next to the destination, verify, then rename into place.
    let partial = dest.with_extension("part");
    fs::write(&partial, &content)
        .with_context(|| format!("writing archive to '{}'", partial.display()))?;

    if let Some(expected) = sha256 {
        let actual = file_sha256(&partial)?;
        if actual != expected {
            let _ = fs::remove_file(&partial);
            bail!(
                "archive checksum mismatch for {}\n  expected: {}\n  actual:   {}",
                url,
                expected,
                actual
            );
        }
    }

    fs::rename(&partial, dest)
        .with_context(|| format!("moving archive into place at '{}'", dest.display()))?;

    println!("  Saved {} ({} bytes)", dest.display(), content.len());
    Ok(FetchOutcome::Downloaded)
}

/// Why an existing archive can be reused, or `None` if it must be fetched.
fn cached_archive_usable(dest: &Path, sha256: Option<&str>) -> Result<Option<&'static str>> {
    if !dest.is_file() {
        return Ok(None);
    }

    match sha256 {
        Some(expected) => {
            let actual = file_sha256(dest)?;
            if actual == expected {
                Ok(Some("checksum verified"))
            } else {
                eprintln!(
                    "  [WARN] Cached archive fails verification, re-downloading: {}",
                    dest.display()
                );
                Ok(None)
            }
        }
        None => {
            let len = fs::metadata(dest)
                .with_context(|| format!("reading metadata for '{}'", dest.display()))?
                .len();
            if len > 0 {
                Ok(Some("no checksum pinned"))
            } else {
                Ok(None)
            }
        }
    }
}

fn download(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("talib-bootstrap/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let response = client.get(url).send().with_context(|| {
        format!(
            "Failed to download archive from {} (check network connectivity)",
            url
        )
    })?;

    if !response.status().is_success() {
        bail!(
            "archive download failed with HTTP {} from {}",
            response.status(),
            url
        );
    }

    let bytes = response
        .bytes()
        .with_context(|| format!("reading response body from {}", url))?;

    if bytes.is_empty() {
        bail!("downloaded archive is empty (HTTP 200 but 0 bytes) from {}", url);
    }

    Ok(bytes.to_vec())
}

/// SHA-256 of a file, as a lowercase hex string.
pub fn file_sha256(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("opening '{}' for hashing", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading '{}' for hashing", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sha256_matches_known_digest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn cached_archive_with_matching_checksum_is_reused() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("ta-lib-src.tar.gz");
        fs::write(&dest, b"abc").unwrap();

        let pinned = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        // URL is never contacted when the cache hits; an unreachable one proves it.
        let outcome = ensure_archive("http://127.0.0.1:1/never", &dest, Some(pinned)).unwrap();
        assert_eq!(outcome, FetchOutcome::CachedReuse);
    }

    #[test]
    fn cached_archive_without_pin_is_reused_when_nonempty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("ta-lib-src.tar.gz");
        fs::write(&dest, b"payload").unwrap();

        let outcome = ensure_archive("http://127.0.0.1:1/never", &dest, None).unwrap();
        assert_eq!(outcome, FetchOutcome::CachedReuse);
    }

    #[test]
    fn empty_cached_archive_is_not_reused() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("ta-lib-src.tar.gz");
        fs::write(&dest, b"").unwrap();

        // Cache miss falls through to the (unreachable) download and fails.
        assert!(ensure_archive("http://127.0.0.1:1/never", &dest, None).is_err());
    }

    #[test]
    fn stale_cached_archive_is_refetched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("ta-lib-src.tar.gz");
        fs::write(&dest, b"corrupted").unwrap();

        let pinned = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let result = ensure_archive("http://127.0.0.1:1/never", &dest, Some(pinned));
        assert!(result.is_err(), "mismatching cache must trigger a re-download");
    }

    #[test]
    fn unreachable_url_aborts_the_fetch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("ta-lib-src.tar.gz");

        let err = ensure_archive("http://127.0.0.1:1/never", &dest, None).unwrap_err();
        assert!(format!("{:#}", err).contains("127.0.0.1"));
        assert!(!dest.exists(), "no archive must be left behind on failure");
    }
}
