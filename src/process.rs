//! Subprocess invocation helpers.
//!
//! Thin builder over `std::process::Command` used by every stage that shells
//! out. Captured runs keep quiet tools quiet; interactive runs inherit stdio
//! so the operator sees compiler and pip output live.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Command builder with contextual error reporting.
///
/// ```rust,ignore
/// Cmd::new("make")
///     .args(["-j4"])
///     .cwd(&source_tree)
///     .error_msg("TA-Lib compilation failed")
///     .run_interactive()?;
/// ```
pub struct Cmd {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Message used when the command exits non-zero.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn failure_msg(&self) -> String {
        self.error_msg
            .clone()
            .unwrap_or_else(|| format!("command failed: {}", self.describe()))
    }

    /// Run with captured output. Non-zero exit fails with the exit code and
    /// trimmed stderr in the error.
    pub fn run(self) -> Result<()> {
        let output = self
            .command()
            .output()
            .with_context(|| format!("Failed to execute: {}", self.describe()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{}\n  Exit code: {}\n  stderr: {}",
                self.failure_msg(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(())
    }

    /// Run with captured output and return stdout as a string.
    pub fn run_capture(self) -> Result<String> {
        let output = self
            .command()
            .output()
            .with_context(|| format!("Failed to execute: {}", self.describe()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{}\n  Exit code: {}\n  stderr: {}",
                self.failure_msg(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run with inherited stdio (interactive - user sees progress).
    pub fn run_interactive(self) -> Result<()> {
        let status = self
            .command()
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute: {}", self.describe()))?;

        if !status.success() {
            bail!(
                "{}\n  Exit code: {}",
                self.failure_msg(),
                status.code().unwrap_or(-1)
            );
        }

        Ok(())
    }
}

/// Fail with a descriptive error when a required input path is missing.
pub fn ensure_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} not found at: {}", what, path.display());
    }
    Ok(())
}
