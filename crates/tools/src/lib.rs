//! The MizMaster librarian: documentation sources the model can consult.
//!
//! - **Compressor**: signature-only rendering of large Lua files
//! - **Resolver**: fuzzy module lookup over cached GitHub tree listings
//! - **Hard deck**: static verified signatures of the scripting engine
//! - **Librarian**: the [`ToolDispatcher`](mizmaster_core::ToolDispatcher)
//!   tying them to the two tool declarations

pub mod cache;
pub mod compressor;
pub mod declarations;
pub mod hard_deck;
pub mod host;
pub mod librarian;
pub mod repos;
pub mod resolver;

pub use cache::{CachedTree, EntryKind, FileTreeCache, InMemoryTreeCache, TreeCache, TreeEntry};
pub use compressor::{compress, compress_source, CompressionResult};
pub use host::{DocHost, GitHubHost, HostError, TreeListing};
pub use librarian::Librarian;
pub use repos::{RepoRegistry, RepoTarget};
pub use resolver::{DocumentationResolver, LookupError, MatchTier, ResolvedDoc};
