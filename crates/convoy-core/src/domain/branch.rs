//! The closed set of branch roles in the convoy branch-flow policy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A branch role within the fixed flow `feature -> integration -> master -> operate`.
///
/// Master, integration and operate are fixed names shared by every repo in a
/// bundle; feature branches are parameterized by a caller-supplied name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchRole {
    /// The official release line; only changes via pull request.
    Master,
    /// Shared branch where feature work converges for joint validation.
    Integration,
    /// Production-running line; updated from releases and hot fixes.
    Operate,
    /// Per-unit-of-work branch; merges only into integration.
    Feature(String),
}

impl BranchRole {
    pub const MASTER: &'static str = "master";
    pub const INTEGRATION: &'static str = "integration";
    pub const OPERATE: &'static str = "operate";

    /// The git branch name for this role.
    pub fn branch_name(&self) -> &str {
        match self {
            BranchRole::Master => Self::MASTER,
            BranchRole::Integration => Self::INTEGRATION,
            BranchRole::Operate => Self::OPERATE,
            BranchRole::Feature(name) => name.as_str(),
        }
    }

    /// Classify a raw branch name into its role.
    pub fn from_branch_name(name: &str) -> Self {
        match name {
            Self::MASTER => BranchRole::Master,
            Self::INTEGRATION => BranchRole::Integration,
            Self::OPERATE => BranchRole::Operate,
            other => BranchRole::Feature(other.to_string()),
        }
    }
}

impl fmt::Display for BranchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.branch_name())
    }
}
