//! Configuration loading, validation, and management for MizMaster.
//!
//! Loads configuration from `~/.mizmaster/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mizmaster/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model requested for new sessions
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for chat sessions
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Whether the user unlocked the restricted libraries (os, io, lfs)
    #[serde(default)]
    pub desanitized: bool,

    /// GitHub personal access token (raises the API rate limit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    /// Conversation history budget
    #[serde(default)]
    pub context: ContextConfig,

    /// Documentation fetching
    #[serde(default)]
    pub librarian: LibrarianConfig,

    /// Turn loop limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Documentation repositories, keyed by framework and branch key
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryConfig>,
}

fn default_model() -> String {
    "gemini-3-pro-preview".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("desanitized", &self.desanitized)
            .field("github_token", &redact(&self.github_token))
            .field("context", &self.context)
            .field("librarian", &self.librarian)
            .field("engine", &self.engine)
            .field("repositories", &self.repositories)
            .finish()
    }
}

/// Budget applied when pruning history before a session is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Always keep the first message of the conversation
    #[serde(default = "default_true")]
    pub protect_first: bool,

    /// Fixed per-message token overhead (role, delimiters)
    #[serde(default = "default_message_overhead")]
    pub message_overhead: usize,
}

fn default_max_tokens() -> usize {
    30_000
}
fn default_max_messages() -> usize {
    20
}
fn default_message_overhead() -> usize {
    5
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_messages: default_max_messages(),
            protect_first: true,
            message_overhead: default_message_overhead(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarianConfig {
    /// How long a fetched file tree stays trusted
    #[serde(default = "default_tree_cache_ttl_hours")]
    pub tree_cache_ttl_hours: u64,

    /// Lua files larger than this (bytes) are compressed before returning
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Directory for the on-disk tree cache. None = in-memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

fn default_tree_cache_ttl_hours() -> u64 {
    24
}
fn default_compression_threshold() -> usize {
    10_000
}
fn default_api_base_url() -> String {
    "https://api.github.com".into()
}
fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_user_agent() -> String {
    concat!("mizmaster/", env!("CARGO_PKG_VERSION")).into()
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            tree_cache_ttl_hours: default_tree_cache_ttl_hours(),
            compression_threshold: default_compression_threshold(),
            api_base_url: default_api_base_url(),
            raw_base_url: default_raw_base_url(),
            user_agent: default_user_agent(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum model turns per send (tool round-trips included)
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Give up if the model sends nothing within this many seconds
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Rebuild the session when history length drifts by more than this
    #[serde(default = "default_refresh_drift")]
    pub refresh_drift: usize,
}

fn default_max_turns() -> u32 {
    5
}
fn default_connection_timeout_secs() -> u64 {
    30
}
fn default_refresh_drift() -> usize {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            connection_timeout_secs: default_connection_timeout_secs(),
            refresh_drift: default_refresh_drift(),
        }
    }
}

/// A documentation repository reachable by the `get_framework_docs` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Framework name as the model sends it (e.g. "MOOSE")
    pub framework: String,

    /// Branch key as the model sends it (e.g. "STABLE")
    pub branch_key: String,

    pub owner: String,
    pub repo: String,

    /// Actual git branch
    pub branch: String,
}

impl RepositoryConfig {
    fn new(framework: &str, branch_key: &str, owner: &str, repo: &str, branch: &str) -> Self {
        Self {
            framework: framework.into(),
            branch_key: branch_key.into(),
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

fn default_repositories() -> Vec<RepositoryConfig> {
    vec![
        RepositoryConfig::new("MOOSE", "STABLE", "FlightControl-Master", "MOOSE", "master"),
        RepositoryConfig::new("MOOSE", "DEVELOP", "FlightControl-Master", "MOOSE", "develop"),
        RepositoryConfig::new("DML", "MAIN", "csofranz", "DML", "main"),
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.mizmaster/config.toml).
    ///
    /// Environment overrides:
    /// - `MIZMASTER_MODEL`
    /// - `MIZMASTER_GITHUB_TOKEN` (then `GITHUB_TOKEN`) when no token is configured
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("MIZMASTER_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }

        if self.github_token.is_none() {
            self.github_token = lookup("MIZMASTER_GITHUB_TOKEN")
                .or_else(|| lookup("GITHUB_TOKEN"))
                .filter(|t| !t.trim().is_empty());
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mizmaster")
    }

    /// Default location of the on-disk tree cache.
    pub fn default_cache_dir() -> PathBuf {
        Self::config_dir().join("tree-cache")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.engine.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_turns must be at least 1".into(),
            ));
        }

        if self.context.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_messages must be at least 1".into(),
            ));
        }

        if let Some(dup) = self.repositories.iter().enumerate().find_map(|(i, a)| {
            self.repositories[i + 1..]
                .iter()
                .find(|b| {
                    a.framework.eq_ignore_ascii_case(&b.framework)
                        && a.branch_key.eq_ignore_ascii_case(&b.branch_key)
                })
                .map(|_| a)
        }) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate repository entry for {} [{}]",
                dup.framework, dup.branch_key
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            desanitized: false,
            github_token: None,
            context: ContextConfig::default(),
            librarian: LibrarianConfig::default(),
            engine: EngineConfig::default(),
            repositories: default_repositories(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
