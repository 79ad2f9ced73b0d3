//! The standard bundle of repos that together comprise one application.

use serde::{Deserialize, Serialize};

use crate::domain::error::{ConvoyError, Result};

/// Descriptive information about one repo in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Name of the application the repo belongs to.
    pub project: String,
    /// Subproject suffix, e.g. `"svc"` or `"docs"`.
    pub subproject: String,
    /// Derived full repo name, `"{project}.{subproject}"`.
    pub name: String,
    /// Short human description of the repo's purpose.
    pub description: String,
}

impl RepoInfo {
    fn new(project: &str, subproject: &str, description: &str) -> Self {
        RepoInfo {
            project: project.to_string(),
            subproject: subproject.to_string(),
            name: format!("{project}.{subproject}"),
            description: description.to_string(),
        }
    }
}

/// The default subproject suffixes of a convoy application.
pub const DEFAULT_SUBPROJECTS: [&str; 5] = ["svc", "docs", "test", "scenarios", "ops"];

/// An ordered, immutable set of [`RepoInfo`] for one application.
///
/// Repo names are unique within a bundle; construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoBundle {
    project: String,
    repos: Vec<RepoInfo>,
}

impl RepoBundle {
    /// Build the standard bundle for `project` with the default subprojects
    /// (svc, docs, test, scenarios, ops).
    pub fn new(project: &str) -> Self {
        // Default suffixes are distinct, so this cannot fail.
        match Self::with_subprojects(project, &DEFAULT_SUBPROJECTS) {
            Ok(bundle) => bundle,
            Err(_) => unreachable!("default subproject suffixes are unique"),
        }
    }

    /// Build a bundle for `project` with an explicit suffix list, in the
    /// given order.
    pub fn with_subprojects(project: &str, subprojects: &[&str]) -> Result<Self> {
        let mut repos: Vec<RepoInfo> = Vec::with_capacity(subprojects.len());
        for suffix in subprojects {
            let info = RepoInfo::new(project, suffix, Self::describe(suffix));
            if repos.iter().any(|r| r.name == info.name) {
                return Err(ConvoyError::DuplicateRepo { name: info.name });
            }
            repos.push(info);
        }
        Ok(RepoBundle {
            project: project.to_string(),
            repos,
        })
    }

    /// The application name this bundle was built for.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// The repos comprising this bundle, in construction order.
    pub fn bundled_repos(&self) -> &[RepoInfo] {
        &self.repos
    }

    /// Full repo names, in construction order.
    pub fn repo_names(&self) -> Vec<String> {
        self.repos.iter().map(|r| r.name.clone()).collect()
    }

    fn describe(subproject: &str) -> &'static str {
        match subproject {
            "svc" => "Source code for business logic and service layers",
            "docs" => "Source code for documentation website",
            "test" => "Source code for test cases",
            "scenarios" => "Collection of self-contained datasets used by test cases",
            "ops" => "Source code for tools to operate the application",
            _ => "Repo in the application bundle",
        }
    }
}
