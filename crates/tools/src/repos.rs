//! Repository registry: maps a (framework, branch key) request to a concrete
//! GitHub repository and branch.

use mizmaster_config::{AppConfig, RepositoryConfig};
use mizmaster_core::Framework;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Branch key used when the model does not name one.
pub const DEFAULT_BRANCH_KEY: &str = "DEVELOP";

/// A concrete repository at a concrete branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Key under which the file tree of this target is cached.
    pub fn cache_key(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

impl fmt::Display for RepoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Known documentation repositories.
#[derive(Debug, Clone)]
pub struct RepoRegistry {
    entries: Vec<RepositoryConfig>,
}

impl RepoRegistry {
    pub fn new(entries: Vec<RepositoryConfig>) -> Self {
        Self { entries }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.repositories.clone())
    }

    /// Normalize a request to a repository.
    ///
    /// A framework with a single configured repository ignores the branch
    /// key (DML only publishes `main`). Otherwise the key defaults to
    /// `DEVELOP` and must match an entry.
    pub fn resolve(&self, framework: Framework, branch_key: Option<&str>) -> Option<RepoTarget> {
        let candidates: Vec<&RepositoryConfig> = self
            .entries
            .iter()
            .filter(|e| e.framework.eq_ignore_ascii_case(framework.as_str()))
            .collect();

        let entry = match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => {
                let key = branch_key.unwrap_or(DEFAULT_BRANCH_KEY);
                many.iter()
                    .find(|e| e.branch_key.eq_ignore_ascii_case(key))
                    .copied()
            }
        }?;

        Some(RepoTarget::new(&entry.owner, &entry.repo, &entry.branch))
    }
}

impl Default for RepoRegistry {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moose_branches_map_to_git_branches() {
        let registry = RepoRegistry::default();
        let stable = registry.resolve(Framework::Moose, Some("STABLE")).unwrap();
        assert_eq!(stable, RepoTarget::new("FlightControl-Master", "MOOSE", "master"));

        let develop = registry.resolve(Framework::Moose, Some("develop")).unwrap();
        assert_eq!(develop.branch, "develop");
    }

    #[test]
    fn missing_branch_defaults_to_develop() {
        let target = RepoRegistry::default().resolve(Framework::Moose, None).unwrap();
        assert_eq!(target.branch, "develop");
    }

    #[test]
    fn dml_ignores_branch_key() {
        let registry = RepoRegistry::default();
        for key in [None, Some("STABLE"), Some("DEVELOP")] {
            let target = registry.resolve(Framework::Dml, key).unwrap();
            assert_eq!(target.cache_key(), "csofranz/DML@main");
        }
    }

    #[test]
    fn unknown_branch_is_unresolved() {
        assert!(RepoRegistry::default().resolve(Framework::Moose, Some("BETA")).is_none());
    }

    #[test]
    fn unconfigured_framework_is_unresolved() {
        assert!(RepoRegistry::new(Vec::new()).resolve(Framework::Dml, None).is_none());
    }
}
