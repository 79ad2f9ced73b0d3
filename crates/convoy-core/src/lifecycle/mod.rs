//! Branch lifecycle workflows over a bundle of repos.
//!
//! Three special branches exist in every repo of a bundle: master,
//! integration and operate. Each unit of work adds one feature branch. Code
//! flows along fixed edges only:
//!
//! - feature -> integration: local merge, encapsulated by
//!   [`BranchLifecycleManager::complete_feature`]
//! - integration <-> master: remote pull requests
//! - master -> operate: remote pull request plus a local sync ("publish a
//!   release")
//! - operate -> master -> integration: remote pull requests plus a local
//!   sync ("publish a hot fix")
//!
//! Every workflow applies one per-repo procedure concurrently to all repos in
//! the bundle. Each procedure logs under a `----------- {repo} (location)
//! -----------` header and tags every line with its scheduling-context label,
//! so interleaved concurrent output can be re-sorted into program order
//! afterwards.

use tracing::info;

use crate::admin::RepoAdministration;
use crate::domain::branch::BranchRole;
use crate::domain::error::{ConvoyError, Result};
use crate::git::GitCli;
use crate::inspector::{find_inspector, PullRequestOutcome, RepoInspector};
use crate::sched::{SchedulingContext, Usher};

/// The message `git status` prints when there is nothing to commit.
const CLEAN_TREE_MSG: &str = "nothing to commit, working tree clean";

/// Policy-aware branch workflows across every repo of a bundle.
pub struct BranchLifecycleManager {
    admin: RepoAdministration,
}

impl BranchLifecycleManager {
    pub fn new(admin: RepoAdministration) -> Self {
        BranchLifecycleManager { admin }
    }

    /// The underlying administration layer.
    pub fn admin(&self) -> &RepoAdministration {
        &self.admin
    }

    /// Merge a feature branch into integration locally and push integration,
    /// leaving each repo on whatever branch it had checked out.
    ///
    /// Fails before touching any repo if `feature_branch` *is* the
    /// integration branch, and before touching the remote if a repo has
    /// uncommitted work.
    pub async fn complete_feature(&self, feature_branch: &str) -> Result<()> {
        let integration = BranchRole::INTEGRATION;
        if feature_branch == integration {
            return Err(ConvoyError::SelfReferencingMerge {
                branch: feature_branch.to_string(),
            });
        }

        let parent = SchedulingContext::new();
        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let feature = feature_branch.to_string();
            usher.admit(async move {
                one_repo_complete_feature(&local_root, &repo_name, &feature, &ctx).await
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Pull-request the remote master from the remote integration and vice
    /// versa, for every repo.
    pub async fn pull_request_integration_to_master(&self) -> Result<()> {
        let parent = SchedulingContext::new();
        let project = self.admin.bundle().project().to_string();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let remote_root = self.admin.remote_root().to_string();
            let token = self.admin.credentials().token.clone();
            let project = project.clone();
            usher.admit(async move {
                info!(sched = %ctx, "----------- {repo_name} (remote) -----------");
                let inspector = find_inspector(&remote_root, &repo_name, token)?;
                let master = BranchRole::MASTER;
                let integration = BranchRole::INTEGRATION;
                remote_pull_request(inspector.as_ref(), &ctx, master, integration, &project)
                    .await?;
                remote_pull_request(inspector.as_ref(), &ctx, integration, master, &project)
                    .await?;
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Publish a release: pull-request the remote operate branch from the
    /// remote master, then synchronize the local operate branch.
    pub async fn publish_release(&self) -> Result<()> {
        let parent = SchedulingContext::new();
        let project = self.admin.bundle().project().to_string();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let remote_root = self.admin.remote_root().to_string();
            let token = self.admin.credentials().token.clone();
            let project = project.clone();
            usher.admit(async move {
                let master = BranchRole::MASTER;
                let operate = BranchRole::OPERATE;

                info!(sched = %ctx, "----------- {repo_name} (remote) -----------");
                let remote = find_inspector(&remote_root, &repo_name, token.clone())?;
                remote_pull_request(remote.as_ref(), &ctx, master, operate, &project).await?;

                info!(sched = %ctx, "----------- {repo_name} (local) -----------");
                let local = find_inspector(&local_root, &repo_name, token)?;
                local.update_local(&ctx.child(), operate).await?;
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Publish a hot fix implemented on the operate branch: pull-request
    /// operate into master and master into integration on the remote, then
    /// synchronize the local integration branch.
    ///
    /// Expects the operator to have already pushed the local operate work to
    /// its remote.
    pub async fn publish_hot_fix(&self) -> Result<()> {
        let parent = SchedulingContext::new();
        let project = self.admin.bundle().project().to_string();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let remote_root = self.admin.remote_root().to_string();
            let token = self.admin.credentials().token.clone();
            let project = project.clone();
            usher.admit(async move {
                let master = BranchRole::MASTER;
                let integration = BranchRole::INTEGRATION;
                let operate = BranchRole::OPERATE;

                info!(sched = %ctx, "----------- {repo_name} (remote) -----------");
                let remote = find_inspector(&remote_root, &repo_name, token.clone())?;
                remote_pull_request(remote.as_ref(), &ctx, operate, master, &project).await?;
                remote_pull_request(remote.as_ref(), &ctx, master, integration, &project)
                    .await?;

                info!(sched = %ctx, "----------- {repo_name} (local) -----------");
                let local = find_inspector(&local_root, &repo_name, token)?;
                local.update_local(&ctx.child(), integration).await?;
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Switch every repo to `feature_branch`, creating it locally and with a
    /// remote tracking branch where it does not exist yet.
    ///
    /// The remote feature branch is a terminal endpoint used as cloud backup;
    /// work is submitted through the integration branch only.
    pub async fn work_on_feature(&self, feature_branch: &str) -> Result<()> {
        let parent = SchedulingContext::new();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let feature = feature_branch.to_string();
            usher.admit(async move {
                let git = GitCli::new(format!("{local_root}/{repo_name}"));
                let existing = git.branch_list().await?;

                info!(sched = %ctx, "----------- {repo_name} (local) -----------");
                if existing.iter().any(|b| b == &feature) {
                    let status = git.checkout(&feature).await?;
                    info!(sched = %ctx, "@ '{feature}' (local):\n\n{status}");
                } else {
                    let status = git.run(&["checkout", "-b", &feature]).await?;
                    info!(sched = %ctx, "Created '{feature}' (local):\n\n{status}");
                    let status = git.run(&["push", "-u", "origin", &feature]).await?;
                    info!(sched = %ctx, "Tracking '{feature}' (local) <-> (remote):\n\n{status}");
                }
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Remove `feature_branch` locally and remotely across all repos,
    /// provided it is already merged into integration *everywhere*.
    ///
    /// The merge check runs across every repo before any deletion; if one
    /// repo fails, no repo's branch is deleted and the error names every
    /// offender.
    pub async fn remove_feature_branch(&self, feature_branch: &str) -> Result<()> {
        let integration = BranchRole::INTEGRATION;
        let parent = SchedulingContext::new();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let local_root = self.admin.local_root().to_string();
            let feature = feature_branch.to_string();
            usher.admit(async move {
                let git = GitCli::new(format!("{local_root}/{repo_name}"));
                let merged = git.merged_branches(integration).await?;
                let is_merged = merged.iter().any(|b| b == &feature);
                Ok((repo_name, is_merged))
            });
        }
        let merge_status = usher.collect().await?;

        let unmerged: Vec<String> = merge_status
            .into_iter()
            .filter(|(_, merged)| !merged)
            .map(|(repo, _)| repo)
            .collect();
        if !unmerged.is_empty() {
            return Err(ConvoyError::UnmergedBranch {
                branch: feature_branch.to_string(),
                destination: integration.to_string(),
                repos: unmerged,
            });
        }

        // All work is merged; removal is safe everywhere.
        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let feature = feature_branch.to_string();
            usher.admit(async move {
                let git = GitCli::new(format!("{local_root}/{repo_name}"));
                info!(sched = %ctx, "----------- {repo_name} (local) -----------");

                let status = git.run(&["branch", "-d", &feature]).await?;
                info!(sched = %ctx, "Deleted local '{feature}':\n{status}");
                let status = git.run(&["push", "origin", "--delete", &feature]).await?;
                info!(sched = %ctx, "Deleted remote '{feature}':\n{status}");
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Commit all local work on `feature_branch` in every repo with one
    /// shared message, then push.
    ///
    /// A preflight pass checks that every repo has `feature_branch` checked
    /// out, and aggregates every violation into one error before anything is
    /// staged.
    pub async fn commit_feature(&self, feature_branch: &str, commit_msg: &str) -> Result<()> {
        let parent = SchedulingContext::new();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let local_root = self.admin.local_root().to_string();
            usher.admit(async move {
                let branch = GitCli::new(format!("{local_root}/{repo_name}"))
                    .current_branch()
                    .await?;
                Ok((repo_name, branch))
            });
        }
        let checks = usher.collect().await?;

        let offenders: Vec<String> = checks
            .iter()
            .filter(|(_, branch)| branch != feature_branch)
            .map(|(repo, branch)| format!("repo '{repo}' is on branch '{branch}'"))
            .collect();
        if !offenders.is_empty() {
            return Err(ConvoyError::WrongBranchCheckedOut {
                expected: feature_branch.to_string(),
                offenders,
            });
        }

        // Preflight passed everywhere; committing is now safe.
        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let feature = feature_branch.to_string();
            let message = commit_msg.to_string();
            let push_url = self.admin.credentials().push_url(&repo_name);
            usher.admit(async move {
                one_repo_commit_and_push(&local_root, &repo_name, &feature, &message, push_url, &ctx)
                    .await
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Commit and push hot-fix work on the operate branch.
    pub async fn commit_hot_fix(&self, commit_msg: &str) -> Result<()> {
        self.commit_feature(BranchRole::OPERATE, commit_msg)
            .await
    }

    /// Cascade newer integration work into a local feature branch: sync
    /// local integration from its remote, then merge it into the feature
    /// branch.
    pub async fn refresh_from_integration(&self, feature_branch: &str) -> Result<()> {
        let parent = SchedulingContext::new();
        let project = self.admin.bundle().project().to_string();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let token = self.admin.credentials().token.clone();
            let feature = feature_branch.to_string();
            let project = project.clone();
            usher.admit(async move {
                let integration = BranchRole::INTEGRATION;
                info!(sched = %ctx, "----------- {repo_name} (local) -----------");

                let local = find_inspector(&local_root, &repo_name, token)?;
                local.update_local(&ctx.child(), integration).await?;
                local
                    .pull_request(
                        &ctx.child(),
                        integration,
                        &feature,
                        &format!("Merge {integration} -> {feature} (local)"),
                        &format!("Automated PR creation by {project}"),
                    )
                    .await?;
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }

    /// Update a local feature branch from a collaborator's remote feature
    /// work.
    pub async fn refresh_from_remote(&self, feature_branch: &str) -> Result<()> {
        let parent = SchedulingContext::new();

        let mut usher = Usher::new();
        for repo_name in self.admin.repo_names() {
            let ctx = parent.child();
            let local_root = self.admin.local_root().to_string();
            let token = self.admin.credentials().token.clone();
            let feature = feature_branch.to_string();
            usher.admit(async move {
                info!(sched = %ctx, "----------- {repo_name} (local) -----------");
                let local = find_inspector(&local_root, &repo_name, token)?;
                local.update_local(&ctx.child(), &feature).await?;
                Ok(())
            });
        }
        usher.collect().await?;
        Ok(())
    }
}

/// The complete-feature procedure for one repo.
async fn one_repo_complete_feature(
    local_root: &str,
    repo_name: &str,
    feature: &str,
    ctx: &SchedulingContext,
) -> Result<()> {
    let integration = BranchRole::INTEGRATION;

    info!(sched = %ctx, "----------- {repo_name} (local) -----------");
    let work_dir = format!("{local_root}/{repo_name}");
    info!(sched = %ctx, "local = '{work_dir}'");
    let git = GitCli::new(&work_dir);

    let original_branch = git.current_branch().await?;

    let status = log_status(&git, &original_branch, ctx).await?;
    if !status.contains(CLEAN_TREE_MSG) {
        return Err(ConvoyError::DirtyWorkingTree {
            repo: repo_name.to_string(),
            branch: original_branch,
            status,
        });
    }

    // Bring other people's work into the local integration branch first,
    // then into the feature branch (this step may itself merge), and only
    // then fold the feature branch into integration and push it.
    switch_to(&git, integration, ctx).await?;
    pull_current(&git, integration, ctx).await?;

    switch_to(&git, feature, ctx).await?;
    merge_into(&git, integration, feature, ctx).await?;

    switch_to(&git, integration, ctx).await?;
    merge_into(&git, feature, integration, ctx).await?;
    push_current(&git, integration, ctx).await?;

    // Leave the repo on the branch it was found on.
    if original_branch != integration {
        switch_to(&git, &original_branch, ctx).await?;
    }
    Ok(())
}

/// The commit-and-push procedure for one repo.
async fn one_repo_commit_and_push(
    local_root: &str,
    repo_name: &str,
    branch: &str,
    commit_msg: &str,
    push_url: Option<String>,
    ctx: &SchedulingContext,
) -> Result<()> {
    info!(sched = %ctx, "----------- {repo_name} (local) -----------");
    let work_dir = format!("{local_root}/{repo_name}");
    info!(sched = %ctx, "local = '{work_dir}'");
    let git = GitCli::new(&work_dir);

    // Committing a clean tree would fail, so skip repos with nothing to do.
    let status = log_status(&git, branch, ctx).await?;
    if !status.contains(CLEAN_TREE_MSG) {
        let staged = git.run(&["add", "."]).await?;
        info!(sched = %ctx, "'{branch}' (working tree) -> '{branch}' (staging area):\n{staged}");
        let committed = git.run(&["commit", "-m", commit_msg]).await?;
        info!(sched = %ctx, "'{branch}' (staging area) -> '{branch}' (local):\n{committed}");
    }

    // When the remote is hosted, the push needs our owner and token embedded
    // in the remote URL.
    if let Some(url) = push_url {
        git.run(&["remote", "set-url", "origin", &url]).await?;
    }

    push_current(&git, branch, ctx).await?;
    Ok(())
}

async fn remote_pull_request(
    inspector: &dyn RepoInspector,
    ctx: &SchedulingContext,
    from_branch: &str,
    to_branch: &str,
    project: &str,
) -> Result<PullRequestOutcome> {
    inspector
        .pull_request(
            &ctx.child(),
            from_branch,
            to_branch,
            &format!("Merge {from_branch} -> {to_branch} (remote)"),
            &format!("Automated PR creation by {project}"),
        )
        .await
}

async fn log_status(git: &GitCli, branch: &str, ctx: &SchedulingContext) -> Result<String> {
    let status = git.status().await?;
    info!(sched = %ctx, "@ '{branch}' (local):\n\n{status}");
    Ok(status)
}

async fn switch_to(git: &GitCli, branch: &str, ctx: &SchedulingContext) -> Result<String> {
    let status = git.checkout(branch).await?;
    info!(sched = %ctx, "@ '{branch}' (local):\n\n{status}");
    Ok(status)
}

async fn merge_into(
    git: &GitCli,
    from_branch: &str,
    to_branch: &str,
    ctx: &SchedulingContext,
) -> Result<String> {
    let status = git.run(&["merge", from_branch]).await?;
    info!(sched = %ctx, "'{from_branch}' (local) -> '{to_branch}' (local):\n\n{status}");
    Ok(status)
}

async fn pull_current(git: &GitCli, branch: &str, ctx: &SchedulingContext) -> Result<String> {
    let status = git.run(&["pull"]).await?;
    info!(sched = %ctx, "'{branch}' (remote) -> '{branch}' (local):\n\n{status}");
    Ok(status)
}

async fn push_current(git: &GitCli, branch: &str, ctx: &SchedulingContext) -> Result<String> {
    let status = git.run(&["push"]).await?;
    info!(sched = %ctx, "'{branch}' (local) -> '{branch}' (remote):\n\n{status}");
    Ok(status)
}
