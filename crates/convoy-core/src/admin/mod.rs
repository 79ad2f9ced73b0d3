//! Bundle-wide repository administration: concurrent read aggregation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::HubCredentials;
use crate::domain::bundle::RepoBundle;
use crate::domain::commit::CommittedFileInfo;
use crate::domain::error::Result;
use crate::git::GitCli;
use crate::inspector::{find_inspector, RepoInspector};
use crate::sched::Usher;

/// Which side of a repo a row describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RepoLocation {
    Local,
    Remote,
}

impl RepoLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoLocation::Local => "local",
            RepoLocation::Remote => "remote",
        }
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which locations an aggregate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationScope {
    LocalAndRemote,
    LocalOnly,
}

impl LocationScope {
    pub fn includes(&self, location: RepoLocation) -> bool {
        match self {
            LocationScope::LocalAndRemote => true,
            LocationScope::LocalOnly => location == RepoLocation::Local,
        }
    }
}

/// One row of the bundle-wide stats table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStatsRow {
    pub repo_name: String,
    pub location: RepoLocation,
    pub current_branch: String,
    pub untracked_count: usize,
    pub modified_count: usize,
    pub deleted_count: usize,
    pub last_commit_summary: String,
    pub last_commit_timestamp: String,
    pub last_commit_hash: String,
}

/// Full histories per repo and location.
pub type RepoLogs = BTreeMap<String, BTreeMap<RepoLocation, Vec<CommittedFileInfo>>>;

/// Administers the repos of one application bundle across a local root and a
/// remote root.
///
/// All bundle-wide reads fan out one unit of work per (repo, location) and
/// collect deterministically, so concurrent completion order never leaks into
/// output ordering.
#[derive(Clone)]
pub struct RepoAdministration {
    local_root: String,
    remote_root: String,
    bundle: RepoBundle,
    credentials: HubCredentials,
}

impl RepoAdministration {
    pub fn new(
        local_root: &str,
        remote_root: &str,
        bundle: RepoBundle,
        credentials: HubCredentials,
    ) -> Self {
        RepoAdministration {
            local_root: local_root.to_string(),
            remote_root: remote_root.to_string(),
            bundle,
            credentials,
        }
    }

    pub fn local_root(&self) -> &str {
        &self.local_root
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    pub fn bundle(&self) -> &RepoBundle {
        &self.bundle
    }

    pub fn credentials(&self) -> &HubCredentials {
        &self.credentials
    }

    /// Names of all repos in the bundle, sorted.
    pub fn repo_names(&self) -> Vec<String> {
        let mut names = self.bundle.repo_names();
        names.sort();
        names
    }

    /// Inspector bound to the local side of `repo_name`.
    pub fn local_inspector(&self, repo_name: &str) -> Result<Box<dyn RepoInspector>> {
        find_inspector(&self.local_root, repo_name, self.credentials.token.clone())
    }

    /// Inspector bound to the remote side of `repo_name`.
    pub fn remote_inspector(&self, repo_name: &str) -> Result<Box<dyn RepoInspector>> {
        find_inspector(&self.remote_root, repo_name, self.credentials.token.clone())
    }

    /// Git command surface for the local working copy of `repo_name`.
    pub fn local_git(&self, repo_name: &str) -> GitCli {
        GitCli::new(format!("{}/{}", self.local_root, repo_name))
    }

    /// Branches of the local repo `repo_name`.
    pub async fn branches(&self, repo_name: &str) -> Result<Vec<String>> {
        self.local_git(repo_name).branch_list().await
    }

    /// The branch currently checked out in the local repo `repo_name`.
    pub async fn current_local_branch(&self, repo_name: &str) -> Result<String> {
        self.local_git(repo_name).current_branch().await
    }

    /// True iff `branch` is already merged into `destination` in the local
    /// repo `repo_name`.
    pub async fn is_branch_merged_to(
        &self,
        repo_name: &str,
        branch: &str,
        destination: &str,
    ) -> Result<bool> {
        let merged = self.local_git(repo_name).merged_branches(destination).await?;
        Ok(merged.iter().any(|b| b == branch))
    }

    /// Per-(repo, location) status table, collected concurrently and sorted
    /// by (repo name, location) so output is deterministic.
    pub async fn repo_stats(
        &self,
        scope: Option<Vec<String>>,
        usage: LocationScope,
    ) -> Result<Vec<RepoStatsRow>> {
        let repos = scope.unwrap_or_else(|| self.repo_names());

        let mut usher = Usher::new();
        for repo_name in &repos {
            for (location, root) in [
                (RepoLocation::Local, &self.local_root),
                (RepoLocation::Remote, &self.remote_root),
            ] {
                if !usage.includes(location) {
                    continue;
                }
                let root = root.clone();
                let repo_name = repo_name.clone();
                let token = self.credentials.token.clone();
                usher.admit(async move {
                    let inspector = find_inspector(&root, &repo_name, token)?;
                    one_repo_stats(inspector.as_ref(), location).await
                });
            }
        }

        let mut rows = usher.collect().await?;
        rows.sort_by(|a, b| {
            a.repo_name
                .cmp(&b.repo_name)
                .then_with(|| a.location.cmp(&b.location))
        });
        Ok(rows)
    }

    /// Full commit histories for every repo in scope, per location.
    pub async fn repo_logs(
        &self,
        scope: Option<Vec<String>>,
        usage: LocationScope,
    ) -> Result<RepoLogs> {
        let repos = scope.unwrap_or_else(|| self.repo_names());

        type RepoLogEntry = (String, RepoLocation, Vec<CommittedFileInfo>);
        let mut usher: Usher<RepoLogEntry> = Usher::new();
        for repo_name in &repos {
            for (location, root) in [
                (RepoLocation::Local, &self.local_root),
                (RepoLocation::Remote, &self.remote_root),
            ] {
                if !usage.includes(location) {
                    continue;
                }
                let root = root.clone();
                let repo_name = repo_name.clone();
                let token = self.credentials.token.clone();
                usher.admit(async move {
                    let inspector = find_inspector(&root, &repo_name, token)?;
                    let rows = inspector.committed_files().await?;
                    Ok((repo_name, location, rows))
                });
            }
        }

        let mut logs: RepoLogs = BTreeMap::new();
        for (repo_name, location, rows) in usher.collect().await? {
            logs.entry(repo_name).or_default().insert(location, rows);
        }
        Ok(logs)
    }
}

async fn one_repo_stats(
    inspector: &dyn RepoInspector,
    location: RepoLocation,
) -> Result<RepoStatsRow> {
    let current_branch = inspector.current_branch().await?;
    let commit = inspector.last_commit().await?;
    let untracked = inspector.untracked_files().await?;
    let modified = inspector.modified_files().await?;
    let deleted = inspector.deleted_files().await?;

    Ok(RepoStatsRow {
        repo_name: inspector.repo_name().to_string(),
        location,
        current_branch,
        untracked_count: untracked.len(),
        modified_count: modified.len(),
        deleted_count: deleted.len(),
        last_commit_summary: commit.message,
        last_commit_timestamp: commit.timestamp,
        last_commit_hash: commit.hash,
    })
}
