//! Domain-level error taxonomy for convoy.

use thiserror::Error;

/// Convoy domain errors.
///
/// Precondition violations (`DirtyWorkingTree`, `WrongBranchCheckedOut`,
/// `SelfReferencingMerge`, `UnmergedBranch`) are raised before any repo is
/// mutated and always name the offending repo(s) and the observed state.
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// A git command exited non-zero.
    #[error("git command failed in '{work_dir}': `git {command}`: {stderr}")]
    GitCommand {
        work_dir: String,
        command: String,
        stderr: String,
    },

    /// A merge was requested while the working tree still has uncommitted work.
    #[error("can't merge: uncommitted work in repo '{repo}' on branch '{branch}':\n{status}")]
    DirtyWorkingTree {
        repo: String,
        branch: String,
        status: String,
    },

    /// A branch was asked to merge into itself.
    #[error(
        "a self-referencing merge '{branch}' -> '{branch}' is not allowed; \
         are you sure you provided the correct feature branch?"
    )]
    SelfReferencingMerge { branch: String },

    /// One or more repos had an unexpected branch checked out. Each offender
    /// entry reads `repo '<name>' is on branch '<branch>'`.
    #[error("can't commit work: expected branch '{expected}' checked out, but {offenders:?}")]
    WrongBranchCheckedOut {
        expected: String,
        offenders: Vec<String>,
    },

    /// A branch targeted for deletion is not merged into its destination everywhere.
    #[error("can't remove branch '{branch}': not yet merged into '{destination}' in repo(s): {repos:?}")]
    UnmergedBranch {
        branch: String,
        destination: String,
        repos: Vec<String>,
    },

    /// The operation is meaningless for this inspector variant.
    #[error("operation '{operation}' is not supported by the {variant} repo inspector")]
    NotSupported {
        operation: &'static str,
        variant: &'static str,
    },

    /// Any non-benign failure response from the hosted API.
    #[error("remote rejected request: HTTP {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    /// The hub client is already engaged by another caller.
    #[error("invalid use of the hub client: a session is already open; finish it before opening another")]
    ClientBusy,

    /// The hub client was used after being closed.
    #[error("invalid reuse of the hub client: it has already been closed")]
    ClientClosed,

    /// A repo bundle was constructed with a repeated repo name.
    #[error("duplicate repo name '{name}' in bundle")]
    DuplicateRepo { name: String },

    /// Command or API output did not have the expected shape.
    #[error("malformed output: {0}")]
    Parse(String),

    /// A fan-out bookkeeping failure (a spawned unit of work vanished).
    #[error("fan-out error: {0}")]
    FanOut(String),

    /// HTTP transport failure.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A spawned task panicked or was aborted.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem or process I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for convoy domain operations.
pub type Result<T> = std::result::Result<T, ConvoyError>;
