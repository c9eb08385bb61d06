//! Documentation host: the GitHub tree and raw-content APIs.

use async_trait::async_trait;
use mizmaster_config::LibrarianConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::TreeEntry;
use crate::repos::RepoTarget;

/// Failures talking to the documentation host. Display strings are shown
/// to the model verbatim, so they carry the remedy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("GitHub Token Invalid. Please check your token in Settings.")]
    InvalidToken,

    #[error("{}", rate_limit_message(*authenticated))]
    RateLimited { authenticated: bool },

    #[error("GitHub API Error: {status} {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response from GitHub: {0}")]
    Decode(String),
}

fn rate_limit_message(authenticated: bool) -> &'static str {
    if authenticated {
        "GitHub API Rate Limit Exceeded even with Token. Please wait before fetching more documentation."
    } else {
        "GitHub API Rate Limit Exceeded (60/hr). Add a Personal Access Token in Settings to increase this to 5000/hr."
    }
}

/// Map a tree-listing response status to an error. `None` for success.
pub fn classify_status(status: u16, body: &str, authenticated: bool) -> Option<HostError> {
    match status {
        200..=299 => None,
        401 => Some(HostError::InvalidToken),
        403 | 429 => Some(HostError::RateLimited { authenticated }),
        _ => Some(HostError::Status {
            status,
            message: body.trim().to_string(),
        }),
    }
}

/// A recursive listing of one repository branch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeListing {
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,

    /// The API stops listing very large repositories
    #[serde(default)]
    pub truncated: bool,
}

/// Source of repository listings and file contents.
#[async_trait]
pub trait DocHost: Send + Sync {
    /// Fetch the recursive file listing, authenticating when a token is given.
    async fn fetch_tree(
        &self,
        target: &RepoTarget,
        token: Option<&str>,
    ) -> Result<TreeListing, HostError>;

    /// Download a file's raw content.
    async fn fetch_raw(&self, target: &RepoTarget, path: &str) -> Result<String, HostError>;

    /// Public URL of a file's raw content.
    fn raw_url(&self, target: &RepoTarget, path: &str) -> String;
}

/// [`DocHost`] over the GitHub REST API and raw.githubusercontent.com.
pub struct GitHubHost {
    client: reqwest::Client,
    api_base_url: String,
    raw_base_url: String,
}

impl GitHubHost {
    pub fn new(config: &LibrarianConfig) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| HostError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            raw_base_url: config.raw_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tree_url(&self, target: &RepoTarget) -> String {
        format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base_url, target.owner, target.repo, target.branch
        )
    }
}

#[async_trait]
impl DocHost for GitHubHost {
    async fn fetch_tree(
        &self,
        target: &RepoTarget,
        token: Option<&str>,
    ) -> Result<TreeListing, HostError> {
        let url = self.tree_url(target);
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        debug!(repo = %target, branch = %target.branch, authenticated = token.is_some(), "Fetching tree listing");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| HostError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status, repo = %target, "GitHub tree request failed");
            return Err(classify_status(status, &body, token.is_some())
                .unwrap_or(HostError::Status { status, message: body }));
        }

        response
            .json::<TreeListing>()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }

    async fn fetch_raw(&self, target: &RepoTarget, path: &str) -> Result<String, HostError> {
        let url = self.raw_url(target, path);
        debug!(url = %url, "Downloading raw file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HostError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HostError::Status {
                status: response.status().as_u16(),
                message: response.status().canonical_reason().unwrap_or("").to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }

    fn raw_url(&self, target: &RepoTarget, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base_url, target.owner, target.repo, target.branch, path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_not_an_error() {
        assert_eq!(classify_status(200, "", false), None);
    }

    #[test]
    fn unauthorized_means_bad_token() {
        let err = classify_status(401, "Bad credentials", true).unwrap();
        assert_eq!(err, HostError::InvalidToken);
        assert!(err.to_string().contains("Token Invalid"));
    }

    #[test]
    fn rate_limit_message_depends_on_token() {
        let anonymous = classify_status(403, "", false).unwrap().to_string();
        assert!(anonymous.contains("60/hr"));
        assert!(anonymous.contains("Personal Access Token"));

        let authenticated = classify_status(429, "", true).unwrap().to_string();
        assert!(authenticated.contains("even with Token"));
    }

    #[test]
    fn other_status_is_generic() {
        let err = classify_status(500, "Server Error\n", false).unwrap();
        assert_eq!(err.to_string(), "GitHub API Error: 500 Server Error");
    }

    #[test]
    fn urls_follow_github_layout() {
        let host = GitHubHost::new(&LibrarianConfig::default()).unwrap();
        let target = RepoTarget::new("csofranz", "DML", "main");
        assert_eq!(
            host.tree_url(&target),
            "https://api.github.com/repos/csofranz/DML/git/trees/main?recursive=1"
        );
        assert_eq!(
            host.raw_url(&target, "modules/cloneZones.lua"),
            "https://raw.githubusercontent.com/csofranz/DML/main/modules/cloneZones.lua"
        );
    }

    #[test]
    fn listing_parses_truncation_flag() {
        let listing: TreeListing = serde_json::from_str(
            r#"{"sha":"x","tree":[{"path":"a.lua","type":"blob","size":1}],"truncated":true}"#,
        )
        .unwrap();
        assert!(listing.truncated);
        assert_eq!(listing.entries.len(), 1);
    }
}
