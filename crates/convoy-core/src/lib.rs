//! Convoy Core Library
//!
//! Manages the branch lifecycle of a bundle of related git repositories that
//! together comprise one application: a uniform inspection abstraction over
//! local working copies and hosted repositories, the branch-flow workflows
//! built on top of it, and the concurrency primitives that keep multi-repo
//! output deterministic and logically ordered.

pub mod admin;
pub mod config;
pub mod domain;
pub mod git;
pub mod github;
pub mod inspector;
pub mod lifecycle;
pub mod sched;
pub mod telemetry;

pub use admin::{LocationScope, RepoAdministration, RepoLocation, RepoLogs, RepoStatsRow};

pub use config::HubCredentials;

pub use domain::{
    normalize_commit_timestamp, BranchRole, CommitInfo, CommittedFileInfo, ConvoyError,
    RepoBundle, RepoInfo, Result, COMMIT_TS_FORMAT, DEFAULT_SUBPROJECTS,
};

pub use git::GitCli;

pub use github::{HubClient, HubSession, Resource};

pub use inspector::{
    find_inspector, HubRepoInspector, LocalRepoInspector, PullRequestOutcome, RepoInspector,
};

pub use lifecycle::BranchLifecycleManager;

pub use sched::{reorder, LogRecord, SchedulingContext, Usher};

pub use telemetry::{init_tracing, ReplayCapture};

/// Convoy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
