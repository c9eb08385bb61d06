//! Tree listing cache.
//!
//! Entries carry the time they were fetched; freshness is decided by the
//! resolver. Two backends:
//! - [`InMemoryTreeCache`] for a single process
//! - [`FileTreeCache`], one JSON file per repository key, surviving restarts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Kind of a tree entry as reported by the hosting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule commits and anything else we do not resolve
    #[serde(other)]
    Other,
}

/// One file or directory of a repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            size: Some(size),
        }
    }

    pub fn is_blob(&self) -> bool {
        self.kind == EntryKind::Blob
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A cached listing and when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTree {
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<TreeEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Tree cache I/O failed at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Tree cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage for repository listings, keyed by `owner/repo@branch`.
#[async_trait]
pub trait TreeCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedTree>;

    /// Store a listing. Last write wins.
    async fn put(&self, key: &str, tree: CachedTree) -> Result<(), CacheError>;
}

/// Process-local cache.
#[derive(Default)]
pub struct InMemoryTreeCache {
    trees: RwLock<HashMap<String, CachedTree>>,
}

impl InMemoryTreeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TreeCache for InMemoryTreeCache {
    async fn get(&self, key: &str) -> Option<CachedTree> {
        self.trees.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, tree: CachedTree) -> Result<(), CacheError> {
        self.trees.write().await.insert(key.to_string(), tree);
        Ok(())
    }
}

/// Disk cache: `<dir>/<sanitized key>.json`.
///
/// Unreadable or corrupt files are treated as a miss and removed, so the
/// next lookup refetches.
pub struct FileTreeCache {
    dir: PathBuf,
}

impl FileTreeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl TreeCache for FileTreeCache {
    async fn get(&self, key: &str) -> Option<CachedTree> {
        let path = self.path_for(key);
        let content = tokio::fs::read_to_string(&path).await.ok()?;

        match serde_json::from_str::<CachedTree>(&content) {
            Ok(tree) => {
                debug!(key, entries = tree.entries.len(), "Tree cache hit on disk");
                Some(tree)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupted tree cache entry");
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }

    async fn put(&self, key: &str, tree: CachedTree) -> Result<(), CacheError> {
        let io_err = |path: &Path, e: std::io::Error| CacheError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_err(&self.dir, e))?;

        let path = self.path_for(key);
        let json = serde_json::to_string(&tree)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| io_err(&path, e))?;

        debug!(key, path = %path.display(), "Tree cache written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> CachedTree {
        CachedTree {
            timestamp: Utc::now(),
            entries: vec![
                TreeEntry::blob("Moose Development/Moose/Core/Spawn.lua", 120_000),
                TreeEntry {
                    path: "Moose Development/Moose/Core".into(),
                    kind: EntryKind::Tree,
                    size: None,
                },
            ],
        }
    }

    #[test]
    fn entry_deserializes_github_shape() {
        let entry: TreeEntry = serde_json::from_str(
            r#"{"path":"Core/Spawn.lua","mode":"100644","type":"blob","sha":"abc","size":42}"#,
        )
        .unwrap();
        assert!(entry.is_blob());
        assert_eq!(entry.file_name(), "Spawn.lua");
        assert_eq!(entry.size, Some(42));

        let submodule: TreeEntry =
            serde_json::from_str(r#"{"path":"ext","type":"commit"}"#).unwrap();
        assert_eq!(submodule.kind, EntryKind::Other);
    }

    #[tokio::test]
    async fn in_memory_last_write_wins() {
        let cache = InMemoryTreeCache::new();
        assert!(cache.get("k").await.is_none());

        cache.put("k", sample_tree()).await.unwrap();
        let mut newer = sample_tree();
        newer.entries.truncate(1);
        cache.put("k", newer.clone()).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), newer);
    }

    #[tokio::test]
    async fn file_cache_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let tree = sample_tree();

        FileTreeCache::new(dir.path())
            .put("FlightControl-Master/MOOSE@develop", tree.clone())
            .await
            .unwrap();

        let reopened = FileTreeCache::new(dir.path());
        let loaded = reopened.get("FlightControl-Master/MOOSE@develop").await.unwrap();
        assert_eq!(loaded, tree);
        assert!(reopened.get("csofranz/DML@main").await.is_none());
    }

    #[tokio::test]
    async fn corrupted_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTreeCache::new(dir.path());
        let path = cache.path_for("csofranz/DML@main");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(cache.get("csofranz/DML@main").await.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn keys_become_flat_file_names() {
        let cache = FileTreeCache::new("/tmp/trees");
        let path = cache.path_for("csofranz/DML@main");
        assert_eq!(path, PathBuf::from("/tmp/trees/csofranz_DML_main.json"));
    }
}
