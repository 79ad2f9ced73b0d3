//! Uniform repository inspection over two substrates.
//!
//! [`RepoInspector`] is the capability interface: the same queries and
//! mutations whether the repo is a working copy on the local filesystem
//! ([`LocalRepoInspector`]) or a hosted repository behind a REST API
//! ([`HubRepoInspector`]). Calling code never branches on the substrate; any
//! distinction lives inside each variant's contract. Operations that are
//! meaningless for a substrate fail with [`crate::ConvoyError::NotSupported`]
//! rather than silently imitating the other variant.

pub mod hub;
pub mod local;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::commit::{CommitInfo, CommittedFileInfo};
use crate::domain::error::Result;
use crate::sched::SchedulingContext;

pub use hub::HubRepoInspector;
pub use local::LocalRepoInspector;

/// Result of propagating one branch into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestOutcome {
    /// The merge went through; the hosted variant carries the API's merge
    /// payload, the local variant has no detail to report.
    Merged { detail: Option<Value> },
    /// The remote reported there was nothing to merge. Not an error.
    NothingToMerge,
}

/// Uniform view of one repository at one location.
///
/// An inspector is bound to exactly one (location root, repo name) pair for
/// its lifetime.
#[async_trait]
pub trait RepoInspector: Send + Sync {
    /// The repo this inspector is bound to.
    fn repo_name(&self) -> &str;

    /// The location root (filesystem parent directory or owner URL).
    fn location_root(&self) -> &str;

    /// The checked-out branch; for a hosted repo, the master branch by
    /// convention since "checkout" does not exist there.
    async fn current_branch(&self) -> Result<String>;

    /// Files modified but not staged. Excludes paths with an unstaged
    /// deletion, which are reported only by [`deleted_files`](Self::deleted_files).
    /// Always empty for a hosted repo.
    async fn modified_files(&self) -> Result<Vec<String>>;

    /// Files with an unstaged deletion. Always empty for a hosted repo.
    async fn deleted_files(&self) -> Result<Vec<String>>;

    /// Untracked files. Always empty for a hosted repo.
    async fn untracked_files(&self) -> Result<Vec<String>>;

    /// The most recent commit, timestamp normalized to UTC so both variants
    /// are comparable.
    async fn last_commit(&self) -> Result<CommitInfo>;

    /// Branch names visible at this location, HEAD-pointer entries filtered.
    async fn branches(&self) -> Result<Vec<String>>;

    /// The full commit history, one row per (commit, file), oldest commit
    /// numbered 0. A commit with no file changes still yields exactly one
    /// row with an empty file path.
    async fn committed_files(&self) -> Result<Vec<CommittedFileInfo>>;

    /// Fetch and synchronize `branch` from its remote counterpart. Not
    /// supported by the hosted variant, which *is* the remote.
    async fn update_local(&self, ctx: &SchedulingContext, branch: &str) -> Result<()>;

    /// Propagate `from_branch` into `to_branch`: a pull request on the
    /// hosted variant, a direct merge on the local one. Idempotent with
    /// respect to "nothing to merge".
    async fn pull_request(
        &self,
        ctx: &SchedulingContext,
        from_branch: &str,
        to_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestOutcome>;
}

/// Choose the inspector variant for a location root: URLs get the hosted
/// variant, anything else is treated as a filesystem parent directory.
pub fn find_inspector(
    root: &str,
    repo_name: &str,
    token: Option<String>,
) -> Result<Box<dyn RepoInspector>> {
    if root.starts_with("https://") || root.starts_with("http://") {
        Ok(Box::new(HubRepoInspector::new(root, repo_name, token)?))
    } else {
        Ok(Box::new(LocalRepoInspector::new(root, repo_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_picks_hosted_for_urls() {
        let inspector = find_inspector("https://github.com/stevedores-org", "cargo.svc", None).unwrap();
        assert_eq!(inspector.location_root(), "https://github.com/stevedores-org");
        assert_eq!(inspector.repo_name(), "cargo.svc");
    }

    #[test]
    fn test_factory_picks_local_for_paths() {
        let inspector = find_inspector("/var/repos", "cargo.svc", None).unwrap();
        assert_eq!(inspector.location_root(), "/var/repos");
    }
}
