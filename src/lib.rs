//! linkcard - Content-addressed remote file cache with a durable
//! summary catalog
//!
//! Core plumbing for link-card rendering pipelines: fetch remote
//! resources once, store them under content-derived names, remember
//! per-site metadata between builds, and walk a document tree deciding
//! node by node what to replace.
//!
//! # Architecture
//!
//! Three components, driven sequentially by an external orchestrator:
//! - A catalog store opens one JSON file, serves lookups and updates in
//!   memory, and writes back only when dirty.
//! - A content cache streams a fetched resource once, hashing and
//!   type-sniffing on the way to a temp file, then renames it to its
//!   content digest and deploys it.
//! - A tree visitor walks the document depth-first, pre-order, letting
//!   its callback skip subtrees or splice in replacement nodes.
//!
//! Parsing documents, matching links against site rules, and scraping
//! metadata out of HTTP responses are collaborators behind traits, not
//! part of this crate.
//!
//! # Modules
//!
//! - `cache`: content-addressed fetch, placement and deployment
//! - `store`: the `CachedSiteSummaryStore` catalog
//! - `visit`: sequential async tree traversal

pub mod cache;
pub mod store;
pub mod visit;

// Re-export main types at crate root for convenience
pub use cache::{
    deploy_local_file, CacheResult, ContentCache, DeployError, FetchOptions, Fetcher, HttpFetcher,
    TypeSniffer,
};
pub use store::{CachedSiteSummaryStore, SiteSummary, StoreError, CATALOG_VERSION};
pub use visit::{visit, Generated, TreeNode, VisitFlow, Visitor};
