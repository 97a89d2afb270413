//! Content-addressed file cache.
//!
//! Remote resources are fetched once, stored under the digest of their
//! own bytes, and deployed (copied or moved) into a destination tree.
//!
//! # Cache Layout
//!
//! ```text
//! <cacheRoot>/items/
//! ├── tmp-<sha1hex(url)>        # transient, while a fetch is in flight
//! └── <sha1hex(content)>[.ext]  # durable content file
//! ```
//!
//! The extension comes from the URL's path when it has one, otherwise
//! from sniffing the leading bytes of the content.

pub mod deploy;
pub mod fetch;
pub mod sniff;

pub use deploy::{
    deploy_local_file, remove_files, sha1_hex, AggregateError, CacheResult, ContentCache,
    DeployError,
};
pub use fetch::{ByteStream, FetchOptions, Fetcher, HttpFetcher};
pub use sniff::{FileKind, MagicSniffer, TypeSniffer, SNIFF_HEADER_LEN};
