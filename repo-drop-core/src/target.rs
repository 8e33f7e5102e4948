//! Repository coordinates parsed from a user-supplied repository URL.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Branch written to when the caller does not name one.
pub const DEFAULT_BRANCH: &str = "main";

static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[/@.])github\.com[/:]([^/\s?#]+)/([^/\s?#]+)").expect("repository URL pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),
}

/// Owner, repository and branch the batch is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepositoryTarget {
    /// Parses `https://github.com/<owner>/<repo>` (or the `git@github.com:<owner>/<repo>`
    /// form). A trailing `.git` is stripped. A missing or blank branch falls back to
    /// [`DEFAULT_BRANCH`].
    pub fn parse(repo_url: &str, branch: Option<&str>) -> Result<Self, TargetError> {
        let captures = REPO_URL
            .captures(repo_url.trim())
            .ok_or_else(|| TargetError::InvalidUrl(repo_url.to_owned()))?;

        let owner = captures[1].to_owned();
        let repo = captures[2].trim_end_matches(".git").to_owned();
        if owner.is_empty() || repo.is_empty() {
            return Err(TargetError::InvalidUrl(repo_url.to_owned()));
        }

        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH)
            .to_owned();

        debug!(%owner, %repo, %branch, "Parsed repository target");
        Ok(Self {
            owner,
            repo,
            branch,
        })
    }
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}
