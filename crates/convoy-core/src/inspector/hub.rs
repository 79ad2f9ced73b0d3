//! Inspector for repos hosted behind the GitHub-style REST API.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::domain::branch::BranchRole;
use crate::domain::commit::{normalize_commit_timestamp, CommitInfo, CommittedFileInfo};
use crate::domain::error::{ConvoyError, Result};
use crate::github::{HubClient, Resource};
use crate::inspector::{PullRequestOutcome, RepoInspector};
use crate::sched::SchedulingContext;

/// Drives a hosted repository through its REST API.
///
/// Working-tree queries (modified/deleted/untracked) have no meaning here and
/// return empty lists; `update_local` is refused outright since this variant
/// *is* the remote.
pub struct HubRepoInspector {
    root: String,
    repo_name: String,
    client: HubClient,
}

impl HubRepoInspector {
    /// `root` is the owner URL, e.g. `https://github.com/stevedores-org`;
    /// the owner is its last path segment.
    pub fn new(root: &str, repo_name: &str, token: Option<String>) -> Result<Self> {
        let owner = owner_from_root(root)?;
        Ok(HubRepoInspector {
            root: root.to_string(),
            repo_name: repo_name.to_string(),
            client: HubClient::new(&owner, token)?,
        })
    }

    fn commit_path(&self, reference: &str) -> String {
        format!("/{}/commits/{}", self.repo_name, reference)
    }
}

#[async_trait]
impl RepoInspector for HubRepoInspector {
    fn repo_name(&self) -> &str {
        &self.repo_name
    }

    fn location_root(&self) -> &str {
        &self.root
    }

    async fn current_branch(&self) -> Result<String> {
        // No checkout concept on the hosted side; by convention the master
        // branch plays the role of "current".
        Ok(BranchRole::MASTER.to_string())
    }

    async fn modified_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn deleted_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn untracked_files(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn last_commit(&self) -> Result<CommitInfo> {
        let session = self.client.session()?;
        let data = session
            .get(Resource::Repos, &self.commit_path(BranchRole::MASTER))
            .await?
            .ok_or_else(|| ConvoyError::Parse("empty commit payload for master tip".to_string()))?;

        Ok(CommitInfo {
            hash: str_field(&data, &["sha"])?.to_string(),
            message: str_field(&data, &["commit", "message"])?.to_string(),
            timestamp: normalize_commit_timestamp(str_field(
                &data,
                &["commit", "author", "date"],
            )?)?,
        })
    }

    async fn branches(&self) -> Result<Vec<String>> {
        let session = self.client.session()?;
        let data = session
            .get(Resource::Repos, &format!("/{}/branches", self.repo_name))
            .await?
            .ok_or_else(|| ConvoyError::Parse("empty branch-list payload".to_string()))?;

        let entries = data
            .as_array()
            .ok_or_else(|| ConvoyError::Parse("branch list is not an array".to_string()))?;
        entries
            .iter()
            .map(|entry| str_field(entry, &["name"]).map(str::to_string))
            .filter(|name| !matches!(name.as_deref(), Ok("HEAD")))
            .collect()
    }

    async fn committed_files(&self) -> Result<Vec<CommittedFileInfo>> {
        let session = self.client.session()?;

        // The history is a DAG, not a line list: walk it with an explicit
        // worklist, memoizing visited commits by (hash, date) so a commit
        // reachable through multiple paths (diamond merges) is counted once.
        let mut visited: HashMap<CommitKey, Vec<CommittedFileInfo>> = HashMap::new();
        let mut fetched: HashSet<String> = HashSet::new();
        let mut worklist: Vec<String> = vec![BranchRole::MASTER.to_string()];

        while let Some(reference) = worklist.pop() {
            if !fetched.insert(reference.clone()) {
                continue;
            }
            let data = session
                .get(Resource::Repos, &self.commit_path(&reference))
                .await?
                .ok_or_else(|| {
                    ConvoyError::Parse(format!("empty commit payload for '{reference}'"))
                })?;

            let (key, rows, parents) = commit_rows(&data)?;
            if visited.contains_key(&key) {
                continue;
            }
            visited.insert(key, rows);
            worklist.extend(parents);
        }

        Ok(number_and_flatten(visited))
    }

    async fn update_local(&self, _ctx: &SchedulingContext, _branch: &str) -> Result<()> {
        // A hosted repo has no "local" to update; it already is the remote.
        Err(ConvoyError::NotSupported {
            operation: "update_local",
            variant: "hosted",
        })
    }

    async fn pull_request(
        &self,
        ctx: &SchedulingContext,
        from_branch: &str,
        to_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestOutcome> {
        let session = self.client.session()?;

        let pr_data = json!({
            "title": title,
            "body": body,
            "head": from_branch,
            "base": to_branch,
        });
        let created = session
            .post(
                Resource::Repos,
                &format!("/{}/pulls", self.repo_name),
                &pr_data,
            )
            .await?;

        let pr = match created {
            None => {
                info!(sched = %ctx, "{from_branch}->{to_branch}: no merge needed");
                return Ok(PullRequestOutcome::NothingToMerge);
            }
            Some(pr) => pr,
        };

        let pull_number = u64_field(&pr, &["number"])?;
        info!(sched = %ctx, "{from_branch}->{to_branch}: PR #{pull_number} created");

        let merge_data = json!({
            "commit_title": format!("[PR #{pull_number}] {title}"),
            "commit_message": "",
            "sha": str_field(&pr, &["head", "sha"])?,
            "merge_method": "merge",
        });
        let merged = session
            .put(
                Resource::Repos,
                &format!("/{}/pulls/{pull_number}/merge", self.repo_name),
                &merge_data,
            )
            .await?;
        info!(sched = %ctx, "{from_branch}->{to_branch}: PR #{pull_number} merged");

        Ok(PullRequestOutcome::Merged { detail: merged })
    }
}

/// The (hash, date) deduplication key of the DAG walk.
type CommitKey = (String, String);

/// Extract one commit's rows and parent shas from its API payload.
///
/// Rows leave `commit_nb` at 0; a commit's chronological rank is unknowable
/// until the whole graph has been visited, so numbering happens afterwards in
/// [`number_and_flatten`].
fn commit_rows(data: &Value) -> Result<(CommitKey, Vec<CommittedFileInfo>, Vec<String>)> {
    let hash = str_field(data, &["sha"])?.to_string();
    let date = str_field(data, &["commit", "author", "date"])?.to_string();
    let author = str_field(data, &["commit", "author", "name"])?.to_string();
    let message = str_field(data, &["commit", "message"])?;
    let summary = join_message_lines(message);

    let mut rows = Vec::new();
    if let Some(files) = data.get("files").and_then(Value::as_array) {
        for (file_nb, file_info) in files.iter().enumerate() {
            rows.push(CommittedFileInfo {
                commit_nb: 0,
                commit_date: date.clone(),
                summary: summary.clone(),
                commit_file_nb: file_nb,
                commit_file: str_field(file_info, &["filename"])?.to_string(),
                commit_hash: hash.clone(),
                commit_author: author.clone(),
            });
        }
    }
    // Same contract as the working-copy parser: a commit with no file
    // changes still registers one row.
    if rows.is_empty() {
        rows.push(CommittedFileInfo {
            commit_nb: 0,
            commit_date: date.clone(),
            summary,
            commit_file_nb: 0,
            commit_file: String::new(),
            commit_hash: hash.clone(),
            commit_author: author,
        });
    }

    let parents = data
        .get("parents")
        .and_then(Value::as_array)
        .map(|parents| {
            parents
                .iter()
                .map(|p| str_field(p, &["sha"]).map(str::to_string))
                .collect::<Result<Vec<String>>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(((hash, date), rows, parents))
}

/// Sort visited commits by date descending, number them from (count - 1)
/// down to 0, stamp every row, and flatten most-recent-first.
fn number_and_flatten(visited: HashMap<CommitKey, Vec<CommittedFileInfo>>) -> Vec<CommittedFileInfo> {
    let mut entries: Vec<(CommitKey, Vec<CommittedFileInfo>)> = visited.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let total = entries.len();
    let mut aggregated = Vec::new();
    for (idx, (_, mut rows)) in entries.into_iter().enumerate() {
        let commit_nb = total - 1 - idx;
        for row in &mut rows {
            row.commit_nb = commit_nb;
        }
        aggregated.extend(rows);
    }
    aggregated
}

fn join_message_lines(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn owner_from_root(root: &str) -> Result<String> {
    root.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
        .ok_or_else(|| ConvoyError::Parse(format!("cannot extract owner from root '{root}'")))
}

fn str_field<'a>(value: &'a Value, path: &[&str]) -> Result<&'a str> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key).ok_or_else(|| {
            ConvoyError::Parse(format!("missing field '{}' in API payload", path.join(".")))
        })?;
    }
    cursor.as_str().ok_or_else(|| {
        ConvoyError::Parse(format!("field '{}' is not a string", path.join(".")))
    })
}

fn u64_field(value: &Value, path: &[&str]) -> Result<u64> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key).ok_or_else(|| {
            ConvoyError::Parse(format!("missing field '{}' in API payload", path.join(".")))
        })?;
    }
    cursor.as_u64().ok_or_else(|| {
        ConvoyError::Parse(format!("field '{}' is not a number", path.join(".")))
    })
}
