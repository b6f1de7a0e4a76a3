//! Thin async wrapper around the `git` command line.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Best human-readable explanation for a failed command.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }

    /// Stdout and stderr joined, for commands that report progress on stderr.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (false, false) => format!("{stdout}\n{stderr}"),
            (false, true) => stdout.to_string(),
            _ => stderr.to_string(),
        }
    }
}

/// Runs git commands. Replaced by a fake in tests.
#[async_trait]
pub trait GitCli: Send + Sync {
    /// Run `git <args>` with `dir` as the working directory.
    async fn run(&self, dir: &Path, args: &[&str]) -> std::io::Result<GitOutput>;
}

/// The `git` binary found on `PATH`.
#[derive(Clone)]
pub struct SystemGit {
    program: String,
    env: Vec<(String, String)>,
}

impl SystemGit {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            env: Vec::new(),
        }
    }

    /// Set an extra environment variable for every invocation
    /// (e.g. `GIT_AUTHOR_NAME`).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemGit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemGit")
            .field("program", &self.program)
            .field("env", &self.env.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl GitCli for SystemGit {
    async fn run(&self, dir: &Path, args: &[&str]) -> std::io::Result<GitOutput> {
        debug!("git {} (in {})", args.join(" "), dir.display());

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
