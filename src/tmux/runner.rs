// ABOUTME: Process seam between the tmux adapter and the tmux binary
// Locates the executable and runs it either captured or with inherited stdio

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Locations checked when tmux is not on `PATH`
pub const TMUX_FALLBACK_PATHS: &[&str] = &[
    "/usr/bin/tmux",
    "/usr/local/bin/tmux",
    "/opt/homebrew/bin/tmux",
    "/opt/local/bin/tmux",
    "/snap/bin/tmux",
    "/home/linuxbrew/.linuxbrew/bin/tmux",
];

/// Captured result of a non-interactive invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs with stdout/stderr captured and stdin closed
    async fn output(&self, args: Vec<String>) -> std::io::Result<CommandOutput>;

    /// Runs in the foreground with the caller's stdio; resolves when the child exits
    async fn interactive(&self, args: Vec<String>) -> std::io::Result<bool>;
}

/// Runs a real binary through `tokio::process`
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
}

impl ProcessRunner {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Path of the binary every invocation runs
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn output(&self, args: Vec<String>) -> std::io::Result<CommandOutput> {
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn interactive(&self, args: Vec<String>) -> std::io::Result<bool> {
        let status = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        Ok(status.success())
    }
}

/// Finds tmux on `PATH`, then in the common install locations.
pub fn discover_tmux() -> Option<PathBuf> {
    discover_binary("tmux", TMUX_FALLBACK_PATHS)
}

/// `which` lookup for `name`, then the first executable entry in `fallbacks`
pub fn discover_binary(name: &str, fallbacks: &[&str]) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        debug!("Found {} on PATH at {}", name, path.display());
        return Some(path);
    }

    fallbacks
        .iter()
        .map(Path::new)
        .find(|candidate| is_executable(candidate))
        .map(|found| {
            debug!("Found {} at fallback location {}", name, found.display());
            found.to_path_buf()
        })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
