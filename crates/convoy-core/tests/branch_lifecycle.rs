//! Integration tests for the branch lifecycle workflows, driven against real
//! git repositories with filesystem remotes.
//!
//! Covered:
//! - complete_feature end-to-end across a two-repo bundle
//! - precondition failures (self-referencing merge, dirty working tree)
//! - validate-then-act feature-branch removal
//! - commit preflight aggregation and credential-free push
//! - work_on_feature branch creation with remote tracking
//! - captured workflow logs replaying in logical per-repo order

use std::path::{Path, PathBuf};
use std::process::Command;

use convoy_core::{
    reorder, BranchLifecycleManager, ConvoyError, HubCredentials, RepoAdministration,
    RepoBundle, ReplayCapture,
};
use tracing_subscriber::layer::SubscriberExt;

fn run_git(repo_dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        repo_dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn write_file(repo_dir: &Path, name: &str, content: &str) {
    std::fs::write(repo_dir.join(name), content).unwrap();
}

struct BundleFixture {
    _root: tempfile::TempDir,
    local_root: PathBuf,
    remote_root: PathBuf,
    manager: BranchLifecycleManager,
    repo_names: Vec<String>,
}

impl BundleFixture {
    /// Create bare "remote" repos plus local clones with master and
    /// integration branches, both tracking their remote counterparts.
    fn new(project: &str, subprojects: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        let local_root = root.path().join("local");
        let remote_root = root.path().join("remote");
        std::fs::create_dir_all(&local_root).unwrap();
        std::fs::create_dir_all(&remote_root).unwrap();

        let bundle = RepoBundle::with_subprojects(project, subprojects).unwrap();
        let repo_names = bundle.repo_names();

        for repo_name in &repo_names {
            let bare = remote_root.join(repo_name);
            std::fs::create_dir_all(&bare).unwrap();
            run_git(&bare, &["init", "--bare", "-b", "master"]);

            run_git(
                &local_root,
                &["clone", bare.to_str().unwrap(), repo_name],
            );
            let work = local_root.join(repo_name);
            run_git(&work, &["config", "user.name", "test-user"]);
            run_git(&work, &["config", "user.email", "test@example.com"]);

            write_file(&work, "README.md", &format!("# {repo_name}\n"));
            run_git(&work, &["add", "."]);
            run_git(&work, &["commit", "-m", "initial"]);
            run_git(&work, &["push", "-u", "origin", "master"]);

            run_git(&work, &["checkout", "-b", "integration"]);
            run_git(&work, &["push", "-u", "origin", "integration"]);
        }

        let admin = RepoAdministration::new(
            local_root.to_str().unwrap(),
            remote_root.to_str().unwrap(),
            bundle,
            HubCredentials::default(),
        );
        BundleFixture {
            _root: root,
            local_root,
            remote_root,
            manager: BranchLifecycleManager::new(admin),
            repo_names,
        }
    }

    fn work_dir(&self, repo_name: &str) -> PathBuf {
        self.local_root.join(repo_name)
    }

    fn bare_dir(&self, repo_name: &str) -> PathBuf {
        self.remote_root.join(repo_name)
    }

    /// Create `branch` off integration in every repo, with one committed
    /// change and a remote tracking branch.
    fn start_feature(&self, branch: &str) {
        for repo_name in &self.repo_names {
            let work = self.work_dir(repo_name);
            run_git(&work, &["checkout", "integration"]);
            run_git(&work, &["checkout", "-b", branch]);
            write_file(&work, "feature.txt", &format!("{branch} in {repo_name}\n"));
            run_git(&work, &["add", "."]);
            run_git(&work, &["commit", "-m", &format!("work on {branch}")]);
            run_git(&work, &["push", "-u", "origin", branch]);
        }
    }

    fn rev(&self, repo_name: &str, reference: &str) -> String {
        run_git(&self.work_dir(repo_name), &["rev-parse", reference])
    }

    fn remote_rev(&self, repo_name: &str, reference: &str) -> String {
        run_git(&self.bare_dir(repo_name), &["rev-parse", reference])
    }

    fn current_branch(&self, repo_name: &str) -> String {
        run_git(
            &self.work_dir(repo_name),
            &["rev-parse", "--abbrev-ref", "HEAD"],
        )
    }
}

#[tokio::test]
async fn test_complete_feature_end_to_end_across_two_repos() {
    let fixture = BundleFixture::new("app", &["a", "b"]);
    fixture.start_feature("story1");

    let integration_before: Vec<String> = fixture
        .repo_names
        .iter()
        .map(|r| fixture.rev(r, "integration"))
        .collect();
    let feature_before: Vec<String> = fixture
        .repo_names
        .iter()
        .map(|r| fixture.rev(r, "story1"))
        .collect();

    fixture.manager.complete_feature("story1").await.unwrap();

    for (idx, repo_name) in fixture.repo_names.iter().enumerate() {
        // Feature branch itself is untouched.
        assert_eq!(fixture.rev(repo_name, "story1"), feature_before[idx]);

        // Local integration absorbed the feature commit and moved ahead.
        let integration_now = fixture.rev(repo_name, "integration");
        assert_ne!(integration_now, integration_before[idx]);
        assert_eq!(integration_now, feature_before[idx]);

        // Integration was pushed to the remote.
        assert_eq!(fixture.remote_rev(repo_name, "integration"), integration_now);

        // The originally checked-out branch was restored.
        assert_eq!(fixture.current_branch(repo_name), "story1");
    }
}

#[tokio::test]
async fn test_complete_feature_rejects_merging_integration_into_itself() {
    let fixture = BundleFixture::new("app", &["a", "b"]);
    fixture.start_feature("story1");
    let before: Vec<String> = fixture
        .repo_names
        .iter()
        .map(|r| fixture.rev(r, "integration"))
        .collect();

    let err = fixture
        .manager
        .complete_feature("integration")
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::SelfReferencingMerge { .. }));

    // Nothing moved anywhere.
    for (idx, repo_name) in fixture.repo_names.iter().enumerate() {
        assert_eq!(fixture.rev(repo_name, "integration"), before[idx]);
    }
}

#[tokio::test]
async fn test_complete_feature_stops_on_dirty_working_tree() {
    let fixture = BundleFixture::new("app", &["a", "b"]);
    fixture.start_feature("story1");

    // Leave uncommitted work in one repo.
    let dirty_repo = &fixture.repo_names[0];
    write_file(
        &fixture.work_dir(dirty_repo),
        "feature.txt",
        "uncommitted edit\n",
    );

    let remote_before = fixture.remote_rev(dirty_repo, "integration");

    let err = fixture.manager.complete_feature("story1").await.unwrap_err();
    match err {
        ConvoyError::DirtyWorkingTree { repo, status, .. } => {
            assert_eq!(&repo, dirty_repo);
            assert!(status.contains("feature.txt"), "status should show the file: {status}");
        }
        other => panic!("expected DirtyWorkingTree, got: {other}"),
    }

    // The dirty repo's remote integration was never touched.
    assert_eq!(fixture.remote_rev(dirty_repo, "integration"), remote_before);
}

#[tokio::test]
async fn test_remove_feature_branch_deletes_nothing_when_one_repo_is_unmerged() {
    let fixture = BundleFixture::new("proj", &["svc", "ops", "test"]);
    fixture.start_feature("story7");

    // Merge the feature into integration in the first two repos only.
    for repo_name in &fixture.repo_names[..2] {
        let work = fixture.work_dir(repo_name);
        run_git(&work, &["checkout", "integration"]);
        run_git(&work, &["merge", "story7"]);
    }
    let unmerged_repo = fixture.repo_names[2].clone();
    run_git(
        &fixture.work_dir(&unmerged_repo),
        &["checkout", "integration"],
    );

    let err = fixture
        .manager
        .remove_feature_branch("story7")
        .await
        .unwrap_err();
    match err {
        ConvoyError::UnmergedBranch { branch, repos, .. } => {
            assert_eq!(branch, "story7");
            assert_eq!(repos, vec![unmerged_repo.clone()]);
        }
        other => panic!("expected UnmergedBranch, got: {other}"),
    }

    // No repo lost its branch, merged or not.
    for repo_name in &fixture.repo_names {
        let branches = run_git(&fixture.work_dir(repo_name), &["branch"]);
        assert!(
            branches.contains("story7"),
            "branch should survive in {repo_name}: {branches}"
        );
    }
}

#[tokio::test]
async fn test_remove_feature_branch_succeeds_once_merged_everywhere() {
    let fixture = BundleFixture::new("proj", &["svc", "test"]);
    fixture.start_feature("story8");

    for repo_name in &fixture.repo_names {
        let work = fixture.work_dir(repo_name);
        run_git(&work, &["checkout", "integration"]);
        run_git(&work, &["merge", "story8"]);
    }

    fixture.manager.remove_feature_branch("story8").await.unwrap();

    for repo_name in &fixture.repo_names {
        let branches = run_git(&fixture.work_dir(repo_name), &["branch"]);
        assert!(!branches.contains("story8"), "local branch should be gone");
        let remote_branches = run_git(&fixture.bare_dir(repo_name), &["branch"]);
        assert!(
            !remote_branches.contains("story8"),
            "remote branch should be gone"
        );
    }
}

#[tokio::test]
async fn test_commit_feature_preflight_names_every_offending_repo() {
    let fixture = BundleFixture::new("app", &["a", "b"]);
    fixture.start_feature("story2");

    // One repo wanders off to master.
    let stray_repo = fixture.repo_names[1].clone();
    run_git(&fixture.work_dir(&stray_repo), &["checkout", "master"]);

    // Dirty the conforming repo so a commit would be possible there.
    write_file(
        &fixture.work_dir(&fixture.repo_names[0]),
        "feature.txt",
        "edited\n",
    );
    let feature_before = fixture.rev(&fixture.repo_names[0], "story2");

    let err = fixture
        .manager
        .commit_feature("story2", "checkpoint")
        .await
        .unwrap_err();
    match err {
        ConvoyError::WrongBranchCheckedOut { expected, offenders } => {
            assert_eq!(expected, "story2");
            assert_eq!(offenders.len(), 1);
            assert!(offenders[0].contains(&stray_repo));
            assert!(offenders[0].contains("master"));
        }
        other => panic!("expected WrongBranchCheckedOut, got: {other}"),
    }

    // Preflight failure means nothing was committed anywhere.
    assert_eq!(fixture.rev(&fixture.repo_names[0], "story2"), feature_before);
}

#[tokio::test]
async fn test_commit_feature_commits_dirty_repos_and_skips_clean_ones() {
    let fixture = BundleFixture::new("app", &["a", "b"]);
    fixture.start_feature("story3");

    let dirty_repo = fixture.repo_names[0].clone();
    let clean_repo = fixture.repo_names[1].clone();
    write_file(&fixture.work_dir(&dirty_repo), "extra.txt", "new work\n");
    let clean_before = fixture.rev(&clean_repo, "story3");

    fixture
        .manager
        .commit_feature("story3", "add extra file")
        .await
        .unwrap();

    // The dirty repo gained a commit and pushed it.
    let dirty_now = fixture.rev(&dirty_repo, "story3");
    assert_eq!(fixture.remote_rev(&dirty_repo, "story3"), dirty_now);
    let last_message = run_git(
        &fixture.work_dir(&dirty_repo),
        &["log", "-1", "--pretty=format:%s"],
    );
    assert_eq!(last_message, "add extra file");

    // The clean repo was skipped but still pushed (a no-op).
    assert_eq!(fixture.rev(&clean_repo, "story3"), clean_before);
}

#[tokio::test]
async fn test_work_on_feature_creates_branch_with_remote_tracking() {
    let fixture = BundleFixture::new("app", &["a", "b"]);

    fixture.manager.work_on_feature("story4").await.unwrap();

    for repo_name in &fixture.repo_names {
        assert_eq!(fixture.current_branch(repo_name), "story4");
        // The remote tracking branch exists.
        let remote_sha = fixture.remote_rev(repo_name, "story4");
        assert_eq!(remote_sha, fixture.rev(repo_name, "story4"));
    }

    // A second call just switches back to the existing branch.
    for repo_name in &fixture.repo_names {
        run_git(&fixture.work_dir(repo_name), &["checkout", "integration"]);
    }
    fixture.manager.work_on_feature("story4").await.unwrap();
    for repo_name in &fixture.repo_names {
        assert_eq!(fixture.current_branch(repo_name), "story4");
    }
}

#[tokio::test]
async fn test_complete_feature_logs_replay_grouped_by_repo() {
    let fixture = BundleFixture::new("app", &["a", "b"]);
    fixture.start_feature("story9");

    let capture = ReplayCapture::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    fixture.manager.complete_feature("story9").await.unwrap();

    let replayed = reorder(&capture.drain());
    assert!(!replayed.is_empty());

    // In logical order, every line of app.a's procedure precedes every line
    // of app.b's, however the concurrent execution interleaved.
    let last_a = replayed
        .iter()
        .rposition(|r| r.label.starts_with("0.0"))
        .unwrap();
    let first_b = replayed
        .iter()
        .position(|r| r.label.starts_with("0.1"))
        .unwrap();
    assert!(last_a < first_b, "repo a's lines must all come before repo b's");

    // Each repo's group opens with its header line.
    assert!(replayed[0].message.contains("app.a (local)"));
    assert!(replayed[first_b].message.contains("app.b (local)"));
}

#[tokio::test]
async fn test_refresh_from_remote_pulls_collaborator_work() {
    let fixture = BundleFixture::new("app", &["a"]);
    fixture.start_feature("story5");

    // Push a second commit, then rewind the local branch one commit to
    // simulate a collaborator being ahead of us.
    let repo_name = fixture.repo_names[0].clone();
    let work = fixture.work_dir(&repo_name);
    write_file(&work, "feature.txt", "collaborator work\n");
    run_git(&work, &["add", "."]);
    run_git(&work, &["commit", "-m", "collaborator commit"]);
    run_git(&work, &["push"]);
    let ahead = fixture.rev(&repo_name, "story5");
    run_git(&work, &["reset", "--hard", "HEAD~1"]);
    assert_ne!(fixture.rev(&repo_name, "story5"), ahead);

    fixture.manager.refresh_from_remote("story5").await.unwrap();

    assert_eq!(fixture.rev(&repo_name, "story5"), ahead);
    assert_eq!(fixture.current_branch(&repo_name), "story5");
}

#[tokio::test]
async fn test_refresh_from_integration_merges_new_integration_work() {
    let fixture = BundleFixture::new("app", &["a"]);
    fixture.start_feature("story6");

    // Land someone else's work on integration (locally and remotely).
    let repo_name = fixture.repo_names[0].clone();
    let work = fixture.work_dir(&repo_name);
    run_git(&work, &["checkout", "integration"]);
    write_file(&work, "other.txt", "someone else's work\n");
    run_git(&work, &["add", "."]);
    run_git(&work, &["commit", "-m", "other feature landed"]);
    run_git(&work, &["push"]);
    run_git(&work, &["checkout", "story6"]);

    fixture
        .manager
        .refresh_from_integration("story6")
        .await
        .unwrap();

    // The feature branch now contains the integration file.
    run_git(&work, &["checkout", "story6"]);
    assert!(work.join("other.txt").exists());
}
