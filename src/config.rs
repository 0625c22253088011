use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default TA-Lib release built when no config overrides it.
pub const DEFAULT_TALIB_VERSION: &str = "0.4.0";

/// SHA-256 of `ta-lib-0.4.0-src.tar.gz` as published on SourceForge.
pub const DEFAULT_TALIB_SHA256: &str =
    "9ff41efcb1c011a4b4b6dfc91610b06e39b1d7973ed5d4dee55029a0ac4dc651";

/// Directory name the TA-Lib tarball unpacks to (not versioned upstream).
pub const DEFAULT_SOURCE_DIR: &str = "ta-lib";

const DEFAULT_PREFIX: &str = "/usr";
const DEFAULT_MANIFEST: &str = "requirements.txt";
const CONFIG_FILENAME: &str = "bootstrap.toml";

/// Validated bootstrap configuration.
///
/// Defaults reproduce the original shell bootstrap: TA-Lib 0.4.0 from
/// SourceForge, installed under `/usr`, dependencies from a local
/// `requirements.txt`.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// TA-Lib release version, e.g. "0.4.0".
    pub version: String,
    /// Archive URL override. Derived from the version when unset.
    pub url: Option<String>,
    /// Pinned archive checksum (lowercase hex). `None` skips verification.
    pub sha256: Option<String>,
    /// Install prefix for headers and libraries.
    pub prefix: PathBuf,
    /// Directory name the archive unpacks to.
    pub source_dir: String,
    /// Requirements manifest consumed by pip.
    pub manifest: PathBuf,
    /// Upgrade pip itself before installing the manifest.
    pub upgrade_pip: bool,
    /// Scratch root for downloads, the source tree, lock, and receipt.
    pub work_dir: PathBuf,
    /// Parallel make jobs. `None` means autodetect.
    pub jobs: Option<usize>,
    /// Keep the archive and source tree after a successful build.
    pub keep_artifacts: bool,
    /// Rebuild and reinstall even when the library is already present.
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BootstrapToml {
    talib: Option<TalibToml>,
    python: Option<PythonToml>,
    run: Option<RunToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TalibToml {
    version: Option<String>,
    url: Option<String>,
    sha256: Option<String>,
    prefix: Option<String>,
    source_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PythonToml {
    manifest: Option<String>,
    upgrade_pip: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunToml {
    work_dir: Option<String>,
    jobs: Option<usize>,
    keep_artifacts: Option<bool>,
    force: Option<bool>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_TALIB_VERSION.to_string(),
            url: None,
            sha256: Some(DEFAULT_TALIB_SHA256.to_string()),
            prefix: PathBuf::from(DEFAULT_PREFIX),
            source_dir: DEFAULT_SOURCE_DIR.to_string(),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            upgrade_pip: true,
            work_dir: default_work_dir(),
            jobs: None,
            keep_artifacts: false,
            force: false,
        }
    }
}

/// Default scratch root (~/.cache/talib-bootstrap/).
fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("talib-bootstrap")
}

impl BootstrapConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. With no path, `bootstrap.toml` in the
    /// current directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file not found: {}", path.display());
                }
                Self::from_file(path)
            }
            None => {
                let implicit = Path::new(CONFIG_FILENAME);
                if implicit.is_file() {
                    Self::from_file(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse a config file and merge it over the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        let parsed: BootstrapToml = toml::from_str(&raw)
            .with_context(|| format!("parsing config '{}'", path.display()))?;

        let mut config = Self::default();

        if let Some(talib) = parsed.talib {
            if let Some(version) = talib.version {
                config.version = version.trim().to_string();
                // A custom version has no known checksum; keep one only if pinned below.
                config.sha256 = None;
            }
            if let Some(url) = talib.url {
                config.url = Some(url.trim().to_string());
            }
            if let Some(sha256) = talib.sha256 {
                let sha256 = sha256.trim().to_ascii_lowercase();
                config.sha256 = if sha256.is_empty() { None } else { Some(sha256) };
            }
            if let Some(prefix) = talib.prefix {
                config.prefix = PathBuf::from(prefix.trim());
            }
            if let Some(source_dir) = talib.source_dir {
                config.source_dir = source_dir.trim().to_string();
            }
        }

        if let Some(python) = parsed.python {
            if let Some(manifest) = python.manifest {
                config.manifest = PathBuf::from(manifest.trim());
            }
            if let Some(upgrade_pip) = python.upgrade_pip {
                config.upgrade_pip = upgrade_pip;
            }
        }

        if let Some(run) = parsed.run {
            if let Some(work_dir) = run.work_dir {
                config.work_dir = PathBuf::from(work_dir.trim());
            }
            config.jobs = run.jobs.or(config.jobs);
            if let Some(keep_artifacts) = run.keep_artifacts {
                config.keep_artifacts = keep_artifacts;
            }
            if let Some(force) = run.force {
                config.force = force;
            }
        }

        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version.is_empty() || self.version.contains('/') {
            bail!(
                "invalid config '{}': talib.version must be a bare version string, got '{}'",
                path.display(),
                self.version
            );
        }
        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!(
                    "invalid config '{}': talib.url must be an http(s) URL, got '{}'",
                    path.display(),
                    url
                );
            }
        }
        if let Some(sha256) = &self.sha256 {
            if sha256.len() != 64 || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
                bail!(
                    "invalid config '{}': talib.sha256 must be 64 hex characters",
                    path.display()
                );
            }
        }
        if self.prefix.as_os_str().is_empty() {
            bail!("invalid config '{}': talib.prefix must not be empty", path.display());
        }
        if self.source_dir.is_empty() || self.source_dir.contains('/') {
            bail!(
                "invalid config '{}': talib.source_dir must be a bare directory name",
                path.display()
            );
        }
        if self.manifest.as_os_str().is_empty() {
            bail!("invalid config '{}': python.manifest must not be empty", path.display());
        }
        if self.jobs == Some(0) {
            bail!("invalid config '{}': run.jobs must be at least 1", path.display());
        }
        Ok(())
    }

    /// Archive filename for the configured version.
    pub fn archive_filename(&self) -> String {
        format!("ta-lib-{}-src.tar.gz", self.version)
    }

    /// Effective archive URL: the override, or the SourceForge mirror URL
    /// derived from the version.
    pub fn archive_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "http://prdownloads.sourceforge.net/ta-lib/{}",
                self.archive_filename()
            ),
        }
    }

    /// Downloads directory under the work dir.
    pub fn downloads_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }

    /// Local path the archive is downloaded to.
    pub fn archive_path(&self) -> PathBuf {
        self.downloads_dir().join(self.archive_filename())
    }

    /// Path the source tree extracts to.
    pub fn source_tree(&self) -> PathBuf {
        self.work_dir.join(&self.source_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("bootstrap.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_reproduce_the_original_script() {
        let config = BootstrapConfig::default();
        assert_eq!(config.version, "0.4.0");
        assert_eq!(config.prefix, PathBuf::from("/usr"));
        assert_eq!(config.manifest, PathBuf::from("requirements.txt"));
        assert_eq!(config.archive_filename(), "ta-lib-0.4.0-src.tar.gz");
        assert_eq!(
            config.archive_url(),
            "http://prdownloads.sourceforge.net/ta-lib/ta-lib-0.4.0-src.tar.gz"
        );
        assert!(config.upgrade_pip);
        assert!(!config.keep_artifacts);
        assert!(config.sha256.is_some());
    }

    #[test]
    fn full_config_overrides_every_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_config(
            temp_dir.path(),
            r#"
[talib]
version = "0.6.4"
url = "https://mirror.example/ta-lib-0.6.4-src.tar.gz"
sha256 = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
prefix = "/opt/ta-lib"
source_dir = "ta-lib-0.6.4"

[python]
manifest = "deps/requirements.txt"
upgrade_pip = false

[run]
work_dir = "/tmp/bootstrap-work"
jobs = 2
keep_artifacts = true
force = true
"#,
        );

        let config = BootstrapConfig::from_file(&path).unwrap();
        assert_eq!(config.version, "0.6.4");
        assert_eq!(
            config.archive_url(),
            "https://mirror.example/ta-lib-0.6.4-src.tar.gz"
        );
        assert_eq!(config.prefix, PathBuf::from("/opt/ta-lib"));
        assert_eq!(config.source_tree(), PathBuf::from("/tmp/bootstrap-work/ta-lib-0.6.4"));
        assert_eq!(config.manifest, PathBuf::from("deps/requirements.txt"));
        assert!(!config.upgrade_pip);
        assert_eq!(config.jobs, Some(2));
        assert!(config.keep_artifacts);
        assert!(config.force);
    }

    #[test]
    fn custom_version_drops_the_default_checksum() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_config(temp_dir.path(), "[talib]\nversion = \"0.6.4\"\n");

        let config = BootstrapConfig::from_file(&path).unwrap();
        assert_eq!(config.version, "0.6.4");
        assert_eq!(config.sha256, None, "0.4.0 checksum must not apply to 0.6.4");
        assert_eq!(config.archive_filename(), "ta-lib-0.6.4-src.tar.gz");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_config(temp_dir.path(), "[talib]\nverison = \"0.4.0\"\n");
        assert!(BootstrapConfig::from_file(&path).is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();

        let bad_url = write_config(temp_dir.path(), "[talib]\nurl = \"ftp://mirror/x.tar.gz\"\n");
        assert!(BootstrapConfig::from_file(&bad_url).is_err());

        let bad_sha = write_config(temp_dir.path(), "[talib]\nsha256 = \"deadbeef\"\n");
        assert!(BootstrapConfig::from_file(&bad_sha).is_err());

        let bad_jobs = write_config(temp_dir.path(), "[run]\njobs = 0\n");
        assert!(BootstrapConfig::from_file(&bad_jobs).is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let result = BootstrapConfig::load(Some(Path::new("/nonexistent/bootstrap.toml")));
        assert!(result.is_err());
    }
}
