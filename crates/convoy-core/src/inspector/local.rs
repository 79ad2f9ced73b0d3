//! Inspector for repos living as working copies on the local filesystem.

use async_trait::async_trait;
use tracing::info;

use crate::domain::commit::{normalize_commit_timestamp, CommitInfo, CommittedFileInfo};
use crate::domain::error::{ConvoyError, Result};
use crate::git::GitCli;
use crate::inspector::{PullRequestOutcome, RepoInspector};
use crate::sched::SchedulingContext;

/// Drives a local working copy through the git command surface.
pub struct LocalRepoInspector {
    root: String,
    repo_name: String,
    git: GitCli,
}

impl LocalRepoInspector {
    pub fn new(root: &str, repo_name: &str) -> Self {
        LocalRepoInspector {
            root: root.to_string(),
            repo_name: repo_name.to_string(),
            git: GitCli::new(format!("{root}/{repo_name}")),
        }
    }

    fn split_lines(raw: &str) -> Vec<String> {
        raw.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl RepoInspector for LocalRepoInspector {
    fn repo_name(&self) -> &str {
        &self.repo_name
    }

    fn location_root(&self) -> &str {
        &self.root
    }

    async fn current_branch(&self) -> Result<String> {
        self.git.current_branch().await
    }

    async fn modified_files(&self) -> Result<Vec<String>> {
        let raw = self.git.run(&["ls-files", "-m"]).await?;
        let candidates = Self::split_lines(&raw);

        // `git ls-files -m` counts unstaged deletions as modifications, so
        // subtract them to get the real list of modified files.
        let deleted = self.deleted_files().await?;
        Ok(candidates
            .into_iter()
            .filter(|f| !deleted.contains(f))
            .collect())
    }

    async fn deleted_files(&self) -> Result<Vec<String>> {
        let raw = self.git.run(&["ls-files", "-d"]).await?;
        Ok(Self::split_lines(&raw))
    }

    async fn untracked_files(&self) -> Result<Vec<String>> {
        let raw = self.git.run(&["ls-files", "-o", "--exclude-standard"]).await?;
        Ok(Self::split_lines(&raw))
    }

    async fn last_commit(&self) -> Result<CommitInfo> {
        let raw = self
            .git
            .run(&["log", "-1", "--pretty=format:%H|%aI|%s"])
            .await?;
        parse_last_commit(&raw)
    }

    async fn branches(&self) -> Result<Vec<String>> {
        self.git.branch_list().await
    }

    async fn committed_files(&self) -> Result<Vec<CommittedFileInfo>> {
        let log = self.git.run(&["log", "--name-only"]).await?;
        Ok(parse_name_only_log(&log))
    }

    async fn update_local(&self, ctx: &SchedulingContext, branch: &str) -> Result<()> {
        info!(sched = %ctx, "local = '{}/{}'", self.root, self.repo_name);

        // Remember the original checkout so we can restore it afterwards.
        let original_branch = self.git.current_branch().await?;

        if branch != original_branch {
            let status = self.git.checkout(branch).await?;
            info!(sched = %ctx, "@ '{branch}' (local):\n\n{status}");
        }

        let status = self.git.run(&["pull"]).await?;
        info!(sched = %ctx, "'{branch}' (remote) -> '{branch}' (local):\n\n{status}");

        if branch != original_branch {
            let status = self.git.checkout(&original_branch).await?;
            info!(sched = %ctx, "@ '{original_branch}' (local):\n\n{status}");
        }
        Ok(())
    }

    async fn pull_request(
        &self,
        ctx: &SchedulingContext,
        from_branch: &str,
        to_branch: &str,
        _title: &str,
        _body: &str,
    ) -> Result<PullRequestOutcome> {
        // No hosted API here: a "pull request" collapses to a direct merge of
        // `from_branch` into `to_branch`, restoring the original checkout.
        let original_branch = self.git.current_branch().await?;

        if to_branch != original_branch {
            let status = self.git.checkout(to_branch).await?;
            info!(sched = %ctx, "@ '{to_branch}' (local):\n\n{status}");
        }

        let status = self.git.run(&["merge", from_branch]).await?;
        info!(sched = %ctx, "'{from_branch}' (local) -> '{to_branch}' (local):\n\n{status}");

        if to_branch != original_branch {
            let status = self.git.checkout(&original_branch).await?;
            info!(sched = %ctx, "@ '{original_branch}' (local):\n\n{status}");
        }

        Ok(PullRequestOutcome::Merged { detail: None })
    }
}

/// Parse the `%H|%aI|%s` line of `git log -1`.
fn parse_last_commit(raw: &str) -> Result<CommitInfo> {
    let cleaned = raw.trim().trim_matches('"');
    let mut tokens = cleaned.splitn(3, '|');
    let hash = tokens
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConvoyError::Parse(format!("empty last-commit line: '{raw}'")))?;
    let iso_date = tokens
        .next()
        .ok_or_else(|| ConvoyError::Parse(format!("last-commit line missing date: '{raw}'")))?;
    let message = tokens.next().unwrap_or_default();

    Ok(CommitInfo {
        hash: hash.to_string(),
        message: message.to_string(),
        timestamp: normalize_commit_timestamp(iso_date)?,
    })
}

/// Parse the text blob emitted by `git log --name-only` into one
/// [`CommittedFileInfo`] per (commit, file) pair.
///
/// Per commit the blob holds a header (hash; a `Merge:` line when the commit
/// is a merge; author; date), a blank line, indented summary lines, and then
/// the changed file paths (absent for some merge commits). The log is
/// most-recent-first, so sequence numbers count backward from (total - 1).
fn parse_name_only_log(log: &str) -> Vec<CommittedFileInfo> {
    struct Chunk<'a> {
        hash: &'a str,
        lines: Vec<&'a str>,
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    for line in log.lines() {
        match line.strip_prefix("commit ") {
            Some(rest) if is_commit_hash(rest.trim()) => {
                chunks.push(Chunk {
                    hash: rest.trim(),
                    lines: Vec::new(),
                });
            }
            _ => {
                if let Some(chunk) = chunks.last_mut() {
                    chunk.lines.push(line);
                }
            }
        }
    }

    let total = chunks.len();
    let mut rows = Vec::new();

    for (idx, chunk) in chunks.iter().enumerate() {
        // The log lists commits newest first; number them so 0 is the oldest.
        let commit_nb = total - 1 - idx;

        let mut author = String::new();
        let mut date = String::new();
        let lines = &chunk.lines;

        // Header: Author/Date lines (plus Merge: for merge commits) up to the
        // first indented line, which starts the summary.
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if let Some(value) = line.strip_prefix("Author:") {
                author = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("Date:") {
                date = value.trim().to_string();
            } else if line.starts_with(' ') && !line.trim().is_empty() {
                break;
            }
            i += 1;
        }

        // Summary: indented lines, semicolon-joined; the first non-indented,
        // non-blank line begins the file list.
        let mut summary_parts: Vec<&str> = Vec::new();
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                i += 1;
            } else if line.starts_with(' ') {
                summary_parts.push(line.trim());
                i += 1;
            } else {
                break;
            }
        }
        let summary = summary_parts.join("; ");

        let mut file_nb = 0;
        for line in &lines[i..] {
            let file = line.trim();
            if file.is_empty() {
                continue;
            }
            rows.push(CommittedFileInfo {
                commit_nb,
                commit_date: date.clone(),
                summary: summary.clone(),
                commit_file_nb: file_nb,
                commit_file: file.to_string(),
                commit_hash: chunk.hash.to_string(),
                commit_author: author.clone(),
            });
            file_nb += 1;
        }

        // A merge commit may carry no files at all; still register the commit
        // so it is not silently dropped from aggregate counts.
        if file_nb == 0 {
            rows.push(CommittedFileInfo {
                commit_nb,
                commit_date: date,
                summary,
                commit_file_nb: 0,
                commit_file: String::new(),
                commit_hash: chunk.hash.to_string(),
                commit_author: author,
            });
        }
    }

    rows
}

fn is_commit_hash(s: &str) -> bool {
    s.len() >= 7 && s.chars().all(|c| c.is_ascii_hexdigit())
}
