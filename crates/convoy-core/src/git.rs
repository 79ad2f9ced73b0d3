//! Git integration: run git commands against a working directory.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::domain::error::{ConvoyError, Result};

/// Executes git commands in one repo's working directory and returns their
/// text output.
///
/// Every invocation is a suspension point; a non-zero exit status becomes a
/// [`ConvoyError::GitCommand`] carrying the command and its stderr.
#[derive(Debug, Clone)]
pub struct GitCli {
    work_dir: PathBuf,
}

impl GitCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        GitCli {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run `git <args>` and return trimmed stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .output()
            .await
            .map_err(|e| ConvoyError::GitCommand {
                work_dir: self.work_dir.display().to_string(),
                command: args.join(" "),
                stderr: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ConvoyError::GitCommand {
                work_dir: self.work_dir.display().to_string(),
                command: args.join(" "),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// The currently checked-out branch.
    pub async fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// `git status` text for the working tree.
    pub async fn status(&self) -> Result<String> {
        self.run(&["status"]).await
    }

    /// Switch to `branch`.
    pub async fn checkout(&self, branch: &str) -> Result<String> {
        self.run(&["checkout", branch]).await
    }

    /// Local branch names, with any HEAD-pointer pseudo entries filtered out.
    pub async fn branch_list(&self) -> Result<Vec<String>> {
        let raw = self.run(&["branch"]).await?;
        Ok(parse_branch_list(&raw))
    }

    /// Local branches already merged into `destination`.
    pub async fn merged_branches(&self, destination: &str) -> Result<Vec<String>> {
        let raw = self.run(&["branch", "--merged", destination]).await?;
        Ok(parse_branch_list(&raw))
    }
}

/// Parse `git branch` style output: strip the `*` current-branch marker and
/// surrounding spaces, and skip `->` HEAD-pointer lines.
pub(crate) fn parse_branch_list(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.contains("->"))
        .map(|line| line.trim_start_matches('*').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
