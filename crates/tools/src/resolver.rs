//! Documentation resolver: (framework, module, branch) to annotated source.
//!
//! Resolution steps:
//! 1. Normalize the request to a repository
//! 2. Load the file index from the TTL cache, refetching when stale
//! 3. Fuzzy-match the module name against the index
//! 4. Download the file and compress it when it is large Lua
//! 5. Prepend a metadata banner
//!
//! Every expected failure is a [`LookupError`]; [`DocumentationResolver::resolve`]
//! renders it as an `ERROR: ...` string for the model.

use chrono::{TimeDelta, Utc};
use mizmaster_config::AppConfig;
use mizmaster_core::Framework;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CachedTree, TreeCache, TreeEntry};
use crate::compressor;
use crate::host::{DocHost, HostError};
use crate::repos::{RepoRegistry, RepoTarget};

/// File extension of compressible, matchable sources.
const LUA_EXT: &str = ".lua";

const MAX_SUGGESTIONS: usize = 5;

/// Expected outcomes of a lookup that are not a document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("Unknown repository for {framework} (branch {branch}).")]
    UnknownRepository { framework: Framework, branch: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("{}", not_found_message(module, repo, suggestions))]
    NotFound {
        module: String,
        repo: String,
        suggestions: Vec<String>,
    },

    #[error("Failed to download source file: {url}")]
    Download { url: String, reason: String },
}

fn not_found_message(module: &str, repo: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        format!("Module '{module}' not found in {repo}.")
    } else {
        format!(
            "Module '{module}' not found in {repo}. Did you mean: {}?",
            suggestions.join(", ")
        )
    }
}

/// Which matching rule selected the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// File name is `<query>.lua`, or the query itself (case-sensitive)
    Exact,
    /// Path ends with `/<query>.lua` (case-insensitive)
    Suffix,
    /// A `.lua` path contains the query (case-insensitive)
    Contains,
}

fn is_lua(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(LUA_EXT)
}

fn strip_lua_ext(name: &str) -> &str {
    if is_lua(name) {
        &name[..name.len() - LUA_EXT.len()]
    } else {
        name
    }
}

/// Find the file best matching `query`. First matching tier wins.
pub fn find_module<'a>(entries: &'a [TreeEntry], query: &str) -> Option<(&'a TreeEntry, MatchTier)> {
    let query = strip_lua_ext(query.trim());
    if query.is_empty() {
        return None;
    }
    let lowered = query.to_lowercase();
    let suffix = format!("/{lowered}{LUA_EXT}");
    let lua_name = format!("{query}{LUA_EXT}");
    let blobs = || entries.iter().filter(|e| e.is_blob());

    blobs()
        .find(|e| e.file_name() == lua_name || e.file_name() == query)
        .map(|e| (e, MatchTier::Exact))
        .or_else(|| {
            blobs()
                .find(|e| e.path.to_lowercase().ends_with(&suffix))
                .map(|e| (e, MatchTier::Suffix))
        })
        .or_else(|| {
            blobs()
                .find(|e| is_lua(&e.path) && e.path.to_lowercase().contains(&lowered))
                .map(|e| (e, MatchTier::Contains))
        })
}

/// Up to five `.lua` paths sharing the query's first three characters.
pub fn suggestions(entries: &[TreeEntry], query: &str) -> Vec<String> {
    let prefix: String = query.trim().to_lowercase().chars().take(3).collect();
    if prefix.is_empty() {
        return Vec::new();
    }
    entries
        .iter()
        .filter(|e| e.is_blob() && is_lua(&e.path) && e.path.to_lowercase().contains(&prefix))
        .take(MAX_SUGGESTIONS)
        .map(|e| e.path.clone())
        .collect()
}

/// A resolved, downloaded (and possibly compressed) document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDoc {
    pub target: RepoTarget,
    pub path: String,
    pub tier: MatchTier,
    /// Size of the downloaded file in bytes
    pub original_size: usize,
    pub raw_url: String,
    pub content: String,
    pub compressed: bool,
}

impl ResolvedDoc {
    /// Metadata banner followed by the content.
    pub fn render(&self) -> String {
        format!(
            "[Librarian Source Metadata]\nRepo: {}\nBranch: {}\nFile: {}\nOriginal Size: {} bytes\nRaw URL: {}\n{}\n{}",
            self.target,
            self.target.branch,
            self.path,
            self.original_size,
            self.raw_url,
            "-".repeat(40),
            self.content
        )
    }
}

/// Resolves documentation requests against a [`DocHost`] with a shared
/// [`TreeCache`].
pub struct DocumentationResolver {
    host: Arc<dyn DocHost>,
    cache: Arc<dyn TreeCache>,
    registry: RepoRegistry,
    ttl: TimeDelta,
    compression_threshold: usize,
}

impl DocumentationResolver {
    pub fn new(host: Arc<dyn DocHost>, cache: Arc<dyn TreeCache>) -> Self {
        Self {
            host,
            cache,
            registry: RepoRegistry::default(),
            ttl: TimeDelta::hours(24),
            compression_threshold: 10_000,
        }
    }

    pub fn from_config(config: &AppConfig, host: Arc<dyn DocHost>, cache: Arc<dyn TreeCache>) -> Self {
        let hours = i64::try_from(config.librarian.tree_cache_ttl_hours).unwrap_or(i64::MAX);
        Self::new(host, cache)
            .with_registry(RepoRegistry::from_config(config))
            .with_ttl(TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX))
            .with_compression_threshold(config.librarian.compression_threshold)
    }

    pub fn with_registry(mut self, registry: RepoRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Resolve a request into tool-response text: the annotated document,
    /// or `ERROR: ...`.
    pub async fn resolve(
        &self,
        framework: Framework,
        module: &str,
        branch: Option<&str>,
        token: Option<&str>,
    ) -> String {
        match self.lookup(framework, module, branch, token).await {
            Ok(doc) => doc.render(),
            Err(e) => {
                warn!(%framework, module, error = %e, "Documentation lookup failed");
                format!("ERROR: {e}")
            }
        }
    }

    /// Resolve a request into a typed result.
    pub async fn lookup(
        &self,
        framework: Framework,
        module: &str,
        branch: Option<&str>,
        token: Option<&str>,
    ) -> Result<ResolvedDoc, LookupError> {
        let target = self.registry.resolve(framework, branch).ok_or_else(|| {
            LookupError::UnknownRepository {
                framework,
                branch: branch.unwrap_or("default").to_string(),
            }
        })?;

        let entries = self.file_index(&target, token).await?;

        let Some((entry, tier)) = find_module(&entries, module) else {
            return Err(LookupError::NotFound {
                module: module.to_string(),
                repo: target.to_string(),
                suggestions: suggestions(&entries, module),
            });
        };
        debug!(module, path = %entry.path, ?tier, "Module matched");

        let raw_url = self.host.raw_url(&target, &entry.path);
        let raw = self
            .host
            .fetch_raw(&target, &entry.path)
            .await
            .map_err(|e| LookupError::Download {
                url: raw_url.clone(),
                reason: e.to_string(),
            })?;

        let original_size = raw.len();
        let compressed = original_size > self.compression_threshold && is_lua(&entry.path);
        let content = if compressed {
            let result = compressor::compress_source(&raw);
            info!(
                path = %entry.path,
                original = result.original_length,
                compressed = result.compressed_length,
                ratio = result.ratio,
                "Compressed large source file"
            );
            result.compressed_text
        } else {
            raw
        };

        Ok(ResolvedDoc {
            path: entry.path.clone(),
            target,
            tier,
            original_size,
            raw_url,
            content,
            compressed,
        })
    }

    /// The file index of a repository, from cache while fresh.
    async fn file_index(
        &self,
        target: &RepoTarget,
        token: Option<&str>,
    ) -> Result<Vec<TreeEntry>, LookupError> {
        let key = target.cache_key();

        if let Some(cached) = self.cache.get(&key).await {
            if Utc::now() - cached.timestamp < self.ttl {
                debug!(key = %key, entries = cached.entries.len(), "Tree cache hit");
                return Ok(cached.entries);
            }
            debug!(key = %key, "Tree cache entry expired");
        }

        let listing = self.host.fetch_tree(target, token).await?;
        if listing.truncated {
            warn!(key = %key, entries = listing.entries.len(), "Tree listing was truncated by the API");
        }
        info!(key = %key, entries = listing.entries.len(), "Fetched tree listing");

        let tree = CachedTree {
            timestamp: Utc::now(),
            entries: listing.entries,
        };
        if let Err(e) = self.cache.put(&key, tree.clone()).await {
            warn!(key = %key, error = %e, "Failed to write tree cache");
        }

        Ok(tree.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryTreeCache;
    use crate::host::TreeListing;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockHost {
        entries: Vec<TreeEntry>,
        files: HashMap<String, String>,
        tree_error: Option<HostError>,
        tree_calls: AtomicUsize,
    }

    impl MockHost {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                entries: files
                    .iter()
                    .map(|(p, c)| TreeEntry::blob(*p, c.len() as u64))
                    .collect(),
                files: files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect(),
                tree_error: None,
                tree_calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: HostError) -> Self {
            Self {
                tree_error: Some(err),
                ..Self::new(&[])
            }
        }
    }

    #[async_trait]
    impl DocHost for MockHost {
        async fn fetch_tree(&self, _: &RepoTarget, _: Option<&str>) -> Result<TreeListing, HostError> {
            self.tree_calls.fetch_add(1, Ordering::SeqCst);
            match &self.tree_error {
                Some(e) => Err(e.clone()),
                None => Ok(TreeListing {
                    entries: self.entries.clone(),
                    truncated: false,
                }),
            }
        }

        async fn fetch_raw(&self, _: &RepoTarget, path: &str) -> Result<String, HostError> {
            self.files.get(path).cloned().ok_or(HostError::Status {
                status: 404,
                message: "Not Found".into(),
            })
        }

        fn raw_url(&self, target: &RepoTarget, path: &str) -> String {
            format!("https://raw.test/{}/{}/{path}", target, target.branch)
        }
    }

    fn resolver(host: Arc<MockHost>, cache: Arc<InMemoryTreeCache>) -> DocumentationResolver {
        DocumentationResolver::new(host, cache)
    }

    const MOOSE_DEVELOP: &str = "FlightControl-Master/MOOSE@develop";

    #[test]
    fn exact_tier_beats_suffix_tier() {
        let entries = vec![
            TreeEntry::blob("Docs/spawn.lua", 1),
            TreeEntry::blob("Core/Spawn.lua", 1),
        ];
        let (entry, tier) = find_module(&entries, "Spawn").unwrap();
        assert_eq!(entry.path, "Core/Spawn.lua");
        assert_eq!(tier, MatchTier::Exact);
    }

    #[test]
    fn exact_tier_skips_same_stem_with_other_extension() {
        let entries = vec![
            TreeEntry::blob("Moose Setup/Spawn.md", 1),
            TreeEntry::blob("Moose Development/Moose/Core/Spawn.lua", 1),
        ];
        let (entry, tier) = find_module(&entries, "Spawn").unwrap();
        assert_eq!(entry.path, "Moose Development/Moose/Core/Spawn.lua");
        assert_eq!(tier, MatchTier::Exact);
    }

    #[test]
    fn lowercase_query_resolves_through_suffix_tier() {
        let entries = vec![
            TreeEntry::blob("Moose Development/Moose/Core/SpawnStatic.lua", 1),
            TreeEntry::blob("Moose Development/Moose/Core/Spawn.lua", 1),
        ];
        let (entry, tier) = find_module(&entries, "spawn").unwrap();
        assert_eq!(entry.path, "Moose Development/Moose/Core/Spawn.lua");
        assert_eq!(tier, MatchTier::Suffix);
    }

    #[test]
    fn contains_tier_only_matches_lua() {
        let entries = vec![
            TreeEntry::blob("Docs/airboss-guide.md", 1),
            TreeEntry::blob("Ops/Airboss.lua", 1),
        ];
        let (entry, tier) = find_module(&entries, "irbo").unwrap();
        assert_eq!(entry.path, "Ops/Airboss.lua");
        assert_eq!(tier, MatchTier::Contains);
    }

    #[test]
    fn suggestions_share_query_prefix() {
        let entries: Vec<TreeEntry> = (0..8)
            .map(|i| TreeEntry::blob(format!("Core/Zone{i}.lua"), 1))
            .chain([TreeEntry::blob("Core/Zone.md", 1)])
            .collect();
        let found = suggestions(&entries, "ZoneCapture");
        assert_eq!(found.len(), 5);
        assert!(found.iter().all(|p| p.ends_with(".lua")));
    }

    #[tokio::test]
    async fn resolves_and_annotates_document() {
        let host = Arc::new(MockHost::new(&[("Core/Spawn.lua", "SPAWN = BASE:New()")]));
        let out = resolver(host, Arc::new(InMemoryTreeCache::new()))
            .resolve(Framework::Moose, "spawn", None, None)
            .await;

        assert!(out.starts_with("[Librarian Source Metadata]\nRepo: FlightControl-Master/MOOSE\nBranch: develop\nFile: Core/Spawn.lua\nOriginal Size: 18 bytes\n"));
        assert!(out.ends_with("SPAWN = BASE:New()"));
    }

    #[tokio::test]
    async fn fresh_cache_avoids_refetch() {
        let host = Arc::new(MockHost::new(&[("Core/Spawn.lua", "x")]));
        let r = resolver(host.clone(), Arc::new(InMemoryTreeCache::new()));

        r.resolve(Framework::Moose, "Spawn", None, None).await;
        r.resolve(Framework::Moose, "Spawn", None, None).await;

        assert_eq!(host.tree_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entry_past_ttl_is_refetched() {
        let host = Arc::new(MockHost::new(&[("Core/Spawn.lua", "x")]));
        let cache = Arc::new(InMemoryTreeCache::new());
        let ttl = TimeDelta::hours(24);
        cache
            .put(
                MOOSE_DEVELOP,
                CachedTree {
                    timestamp: Utc::now() - ttl - TimeDelta::milliseconds(1),
                    entries: vec![TreeEntry::blob("Stale/Spawn.lua", 1)],
                },
            )
            .await
            .unwrap();

        let doc = resolver(host.clone(), cache.clone())
            .with_ttl(ttl)
            .lookup(Framework::Moose, "Spawn", None, None)
            .await
            .unwrap();

        assert_eq!(host.tree_calls.load(Ordering::SeqCst), 1);
        assert_eq!(doc.path, "Core/Spawn.lua");
        let rewritten = cache.get(MOOSE_DEVELOP).await.unwrap();
        assert_eq!(rewritten.entries[0].path, "Core/Spawn.lua");
    }

    #[tokio::test]
    async fn unknown_branch_is_in_band_error() {
        let host = Arc::new(MockHost::new(&[]));
        let out = resolver(host.clone(), Arc::new(InMemoryTreeCache::new()))
            .resolve(Framework::Moose, "Spawn", Some("BETA"), None)
            .await;
        assert!(out.starts_with("ERROR: Unknown repository for MOOSE"));
        assert_eq!(host.tree_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_limit_without_cache_propagates() {
        let host = Arc::new(MockHost::failing(HostError::RateLimited { authenticated: false }));
        let out = resolver(host, Arc::new(InMemoryTreeCache::new()))
            .resolve(Framework::Dml, "cloneZones", None, None)
            .await;
        assert!(out.starts_with("ERROR: GitHub API Rate Limit Exceeded (60/hr)"));
    }

    #[tokio::test]
    async fn missing_module_lists_suggestions() {
        let host = Arc::new(MockHost::new(&[
            ("modules/cloneZones.lua", "x"),
            ("modules/cfxZones.lua", "x"),
        ]));
        let out = resolver(host, Arc::new(InMemoryTreeCache::new()))
            .resolve(Framework::Dml, "cloneGroups", None, None)
            .await;
        assert_eq!(
            out,
            "ERROR: Module 'cloneGroups' not found in csofranz/DML. Did you mean: modules/cloneZones.lua?"
        );
    }

    #[tokio::test]
    async fn download_failure_names_raw_url() {
        let mut host = MockHost::new(&[("Core/Spawn.lua", "x")]);
        host.files.clear();
        let out = resolver(Arc::new(host), Arc::new(InMemoryTreeCache::new()))
            .resolve(Framework::Moose, "Spawn", Some("STABLE"), None)
            .await;
        assert_eq!(
            out,
            "ERROR: Failed to download source file: https://raw.test/FlightControl-Master/MOOSE/master/Core/Spawn.lua"
        );
    }

    #[tokio::test]
    async fn large_lua_file_is_compressed() {
        let body = format!(
            "--- Spawn class.\nfunction SPAWN:New(name)\n{}end\n",
            "  self:Step()\n".repeat(1_000)
        );
        let host = Arc::new(MockHost::new(&[("Core/Spawn.lua", body.as_str())]));
        let doc = resolver(host, Arc::new(InMemoryTreeCache::new()))
            .lookup(Framework::Moose, "Spawn", None, None)
            .await
            .unwrap();

        assert!(doc.compressed);
        assert_eq!(doc.original_size, body.len());
        assert!(doc.content.starts_with("--- [SEMANTIC COMPRESSION ACTIVE]"));
        assert!(doc.render().contains(&format!("Original Size: {} bytes", body.len())));
    }

    #[tokio::test]
    async fn large_non_lua_file_is_not_compressed() {
        let body = "x".repeat(20_000);
        let host = Arc::new(MockHost::new(&[("Docs/notes.txt", body.as_str())]));
        let doc = resolver(host, Arc::new(InMemoryTreeCache::new()))
            .lookup(Framework::Moose, "notes.txt", None, None)
            .await
            .unwrap();
        assert_eq!(doc.tier, MatchTier::Exact);
        assert!(!doc.compressed);
        assert_eq!(doc.content, body);
    }
}
