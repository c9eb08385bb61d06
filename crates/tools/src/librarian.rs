//! The librarian: answers the model's documentation tool calls.

use async_trait::async_trait;
use mizmaster_config::AppConfig;
use mizmaster_core::{ToolDefinition, ToolDispatcher, ToolRequest};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{FileTreeCache, InMemoryTreeCache, TreeCache};
use crate::declarations;
use crate::hard_deck;
use crate::host::{GitHubHost, HostError};
use crate::resolver::DocumentationResolver;

/// [`ToolDispatcher`] for `get_framework_docs` and `get_sse_docs`.
pub struct Librarian {
    resolver: DocumentationResolver,
    github_token: RwLock<Option<String>>,
}

impl Librarian {
    pub fn new(resolver: DocumentationResolver) -> Self {
        Self {
            resolver,
            github_token: RwLock::new(None),
        }
    }

    /// Build a librarian talking to GitHub. The tree cache lives on disk when
    /// `librarian.cache_dir` is set, in memory otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self, HostError> {
        let host = Arc::new(GitHubHost::new(&config.librarian)?);
        let cache: Arc<dyn TreeCache> = match &config.librarian.cache_dir {
            Some(dir) => Arc::new(FileTreeCache::new(dir)),
            None => Arc::new(InMemoryTreeCache::new()),
        };

        let resolver = DocumentationResolver::from_config(config, host, cache);
        Ok(Self::new(resolver).with_github_token(config.github_token.clone()))
    }

    pub fn with_github_token(self, token: Option<String>) -> Self {
        Self {
            github_token: RwLock::new(normalize_token(token)),
            ..self
        }
    }

    /// Replace the token used for tree listings. A blank token means
    /// anonymous access.
    pub async fn set_github_token(&self, token: Option<String>) {
        *self.github_token.write().await = normalize_token(token);
    }

    pub fn resolver(&self) -> &DocumentationResolver {
        &self.resolver
    }
}

fn normalize_token(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl ToolDispatcher for Librarian {
    fn definitions(&self) -> Vec<ToolDefinition> {
        declarations::all()
    }

    async fn dispatch(&self, request: &ToolRequest) -> String {
        debug!(tool = request.tool_name(), subject = request.subject(), "Librarian dispatch");

        match request {
            ToolRequest::FrameworkDocs(args) => {
                let token = self.github_token.read().await.clone();
                self.resolver
                    .resolve(
                        args.framework,
                        &args.module_name,
                        args.branch.as_deref(),
                        token.as_deref(),
                    )
                    .await
            }
            ToolRequest::SseDocs(args) => hard_deck::render(&args.category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TreeEntry;
    use crate::host::{DocHost, TreeListing};
    use crate::repos::RepoTarget;
    use async_trait::async_trait;
    use mizmaster_core::{Framework, FrameworkDocsArgs, SseDocsArgs};
    use std::sync::Mutex;

    /// Records the token of every tree request.
    #[derive(Default)]
    struct TokenRecorder {
        tokens: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl DocHost for TokenRecorder {
        async fn fetch_tree(&self, _: &RepoTarget, token: Option<&str>) -> Result<TreeListing, HostError> {
            self.tokens.lock().unwrap().push(token.map(String::from));
            Ok(TreeListing {
                entries: vec![TreeEntry::blob("modules/cloneZones.lua", 10)],
                truncated: false,
            })
        }

        async fn fetch_raw(&self, _: &RepoTarget, _: &str) -> Result<String, HostError> {
            Ok("cloneZones = {}".into())
        }

        fn raw_url(&self, _: &RepoTarget, path: &str) -> String {
            format!("https://raw.test/{path}")
        }
    }

    fn librarian(host: Arc<TokenRecorder>) -> Librarian {
        Librarian::new(DocumentationResolver::new(host, Arc::new(InMemoryTreeCache::new())))
    }

    #[tokio::test]
    async fn sse_request_reads_hard_deck() {
        let out = librarian(Arc::new(TokenRecorder::default()))
            .dispatch(&ToolRequest::SseDocs(SseDocsArgs { category: "timer".into() }))
            .await;
        assert!(out.contains("timer.scheduleFunction"));
    }

    #[tokio::test]
    async fn framework_request_uses_current_token() {
        let host = Arc::new(TokenRecorder::default());
        let lib = librarian(host.clone());
        lib.set_github_token(Some("ghp_abc".into())).await;

        let out = lib
            .dispatch(&ToolRequest::FrameworkDocs(FrameworkDocsArgs {
                framework: Framework::Dml,
                module_name: "cloneZones".into(),
                branch: None,
            }))
            .await;

        assert!(out.contains("File: modules/cloneZones.lua"));
        assert_eq!(*host.tokens.lock().unwrap(), vec![Some("ghp_abc".to_string())]);
    }

    fn dml_request() -> ToolRequest {
        ToolRequest::FrameworkDocs(FrameworkDocsArgs {
            framework: Framework::Dml,
            module_name: "cloneZones".into(),
            branch: None,
        })
    }

    #[tokio::test]
    async fn blank_token_falls_back_to_anonymous() {
        let host = Arc::new(TokenRecorder::default());
        let lib = librarian(host.clone());
        lib.set_github_token(Some("   ".into())).await;
        lib.dispatch(&dml_request()).await;

        let configured = librarian(host.clone()).with_github_token(Some(String::new()));
        configured.dispatch(&dml_request()).await;

        assert_eq!(*host.tokens.lock().unwrap(), vec![None, None]);
    }

    #[tokio::test]
    async fn padded_token_is_trimmed() {
        let host = Arc::new(TokenRecorder::default());
        let lib = librarian(host.clone()).with_github_token(Some("  ghp_abc\n".into()));
        lib.dispatch(&dml_request()).await;
        assert_eq!(*host.tokens.lock().unwrap(), vec![Some("ghp_abc".to_string())]);
    }

    #[test]
    fn offers_both_tools() {
        let lib = librarian(Arc::new(TokenRecorder::default()));
        let names: Vec<String> = lib.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["get_framework_docs", "get_sse_docs"]);
    }
}
