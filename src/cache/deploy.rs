//! Content-addressed placement of remote and local files.
//!
//! A fetched resource streams once through the cache: the bytes land in
//! a temp file named from the URL's digest while the same pass feeds a
//! SHA-1 hasher and the type sniffer. The finished file is renamed to
//! its content digest and deployed into the destination tree, so
//! byte-identical content always resolves to the same name.

use std::fmt;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::fetch::{FetchOptions, Fetcher, HttpFetcher};
use super::sniff::{FileKind, MagicSniffer, TypeSniffer, SNIFF_HEADER_LEN};

/// Errors that can occur while deploying files
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid resource URL: {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to create a directory: {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy a file from {} to {}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move a file from {} to {}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {}; please remove it manually", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write a fetched file: {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport failure from the fetch collaborator, surfaced as-is
    #[error(transparent)]
    Fetch(anyhow::Error),

    /// Several failures in one operation; every cause is surfaced
    #[error("{0}")]
    Aggregate(AggregateError),
}

/// An ordered list of deployment failures.
///
/// Raised when cleanup after a primary failure fails too; all carried
/// errors are reported, never only the first.
#[derive(Debug)]
pub struct AggregateError(pub Vec<DeployError>);

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failures: ", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Outcome of a remote deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult {
    /// Where the content file stays in the cache directory; populated
    /// only when the caller asked to keep it there
    pub cached_file_path: Option<PathBuf>,

    /// Where the file landed under the destination directory
    pub deployed_file_path: PathBuf,
}

/// Hex-encoded SHA-1 digest of `data`
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Place `source` at `destination`, creating parent directories.
///
/// With `keep_original` the source is copied and left intact; otherwise
/// it is renamed onto the destination.
pub async fn deploy_local_file(
    source: &Path,
    destination: &Path,
    keep_original: bool,
) -> Result<(), DeployError> {
    if keep_original {
        copy_file_with_dir(source, destination).await
    } else {
        move_file_with_dir(source, destination).await
    }
}

async fn ensure_parent_dir(path: &Path) -> Result<(), DeployError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DeployError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    Ok(())
}

async fn copy_file_with_dir(source: &Path, destination: &Path) -> Result<(), DeployError> {
    ensure_parent_dir(destination).await?;
    fs::copy(source, destination)
        .await
        .map(|_| ())
        .map_err(|e| DeployError::Copy {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        })
}

async fn move_file_with_dir(source: &Path, destination: &Path) -> Result<(), DeployError> {
    ensure_parent_dir(destination).await?;
    fs::rename(source, destination)
        .await
        .map_err(|e| DeployError::Rename {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        })
}

/// Remove each of `paths`, collecting every failure.
///
/// All removals are attempted; when any fail, the returned
/// [`AggregateError`] carries one wrapped error per failed path, in
/// input order.
pub async fn remove_files(paths: &[PathBuf]) -> Result<(), DeployError> {
    let mut errors = Vec::new();
    for path in paths {
        if let Err(e) = fs::remove_file(path).await {
            errors.push(DeployError::Remove {
                path: path.clone(),
                source: e,
            });
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DeployError::Aggregate(AggregateError(errors)))
    }
}

struct FetchedContent {
    content_hash: String,
    sniffed: Option<FileKind>,
}

/// Fetches remote resources into a content-addressed cache directory
/// and deploys them into a destination tree.
pub struct ContentCache {
    fetcher: Box<dyn Fetcher>,
    sniffer: Box<dyn TypeSniffer>,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    /// Cache wired with the default HTTP fetcher and magic-number sniffer
    pub fn new() -> Self {
        Self::with_collaborators(Box::new(HttpFetcher::new()), Box::new(MagicSniffer))
    }

    /// Cache with injected fetch and sniff collaborators
    pub fn with_collaborators(fetcher: Box<dyn Fetcher>, sniffer: Box<dyn TypeSniffer>) -> Self {
        Self { fetcher, sniffer }
    }

    /// Fetch `file_url` through the cache and deploy it under
    /// `destination_dir`.
    ///
    /// The content lands in `cache_dir` under its content digest plus an
    /// extension taken from the URL path, or failing that from sniffing
    /// the bytes. With `keep_file_in_cache_dir` the cached copy survives
    /// for the next run and its path is reported in the result;
    /// otherwise the file is moved out of the cache. `options` is handed
    /// to the fetch collaborator unmodified.
    pub async fn deploy_remote_file(
        &self,
        file_url: &str,
        destination_dir: &Path,
        cache_dir: &Path,
        keep_file_in_cache_dir: bool,
        options: &FetchOptions,
    ) -> Result<CacheResult, DeployError> {
        let tmp_name = format!("tmp-{}", sha1_hex(file_url.as_bytes()));
        fs::create_dir_all(cache_dir)
            .await
            .map_err(|e| DeployError::CreateDir {
                path: cache_dir.to_path_buf(),
                source: e,
            })?;
        let tmp_path = cache_dir.join(&tmp_name);

        let fetched = self.fetch_to_file(file_url, &tmp_path, options).await?;

        let extension = url_path_extension(file_url)?
            .or_else(|| fetched.sniffed.map(|kind| kind.extension.to_string()));
        let content_name = match extension {
            Some(ext) => format!("{}.{}", fetched.content_hash, ext),
            None => fetched.content_hash,
        };

        let cache_file_path = cache_dir.join(&content_name);
        if let Err(primary) = move_file_with_dir(&tmp_path, &cache_file_path).await {
            // The temp file must not outlive a failed placement; if the
            // cleanup fails too, surface both errors.
            return Err(match remove_files(std::slice::from_ref(&tmp_path)).await {
                Ok(()) => primary,
                Err(cleanup) => {
                    let mut errors = vec![primary];
                    match cleanup {
                        DeployError::Aggregate(AggregateError(mut inner)) => {
                            errors.append(&mut inner)
                        }
                        other => errors.push(other),
                    }
                    DeployError::Aggregate(AggregateError(errors))
                }
            });
        }

        let deployed_file_path = destination_dir.join(&content_name);
        deploy_local_file(&cache_file_path, &deployed_file_path, keep_file_in_cache_dir).await?;

        debug!(
            url = file_url,
            deployed = %deployed_file_path.display(),
            kept_in_cache = keep_file_in_cache_dir,
            "deployed remote file"
        );

        Ok(CacheResult {
            cached_file_path: keep_file_in_cache_dir.then_some(cache_file_path),
            deployed_file_path,
        })
    }

    /// Stream the resource into `path`, hashing and sniffing the same
    /// single pass over the bytes.
    async fn fetch_to_file(
        &self,
        file_url: &str,
        path: &Path,
        options: &FetchOptions,
    ) -> Result<FetchedContent, DeployError> {
        let mut stream = self
            .fetcher
            .fetch(file_url, options)
            .await
            .map_err(DeployError::Fetch)?;

        let mut file = fs::File::create(path).await.map_err(|e| DeployError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut hasher = Sha1::new();
        let mut header: Vec<u8> = Vec::with_capacity(SNIFF_HEADER_LEN);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DeployError::Fetch)?;
            hasher.update(&chunk);
            if header.len() < SNIFF_HEADER_LEN {
                let take = (SNIFF_HEADER_LEN - header.len()).min(chunk.len());
                header.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| DeployError::Write {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
        file.flush().await.map_err(|e| DeployError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(FetchedContent {
            content_hash: hex::encode(hasher.finalize()),
            sniffed: self.sniffer.sniff(&header),
        })
    }
}

/// Extension found in the URL's path component, query excluded
fn url_path_extension(file_url: &str) -> Result<Option<String>, DeployError> {
    let parsed = Url::parse(file_url).map_err(|e| DeployError::InvalidUrl {
        url: file_url.to_string(),
        source: e,
    })?;
    Ok(Path::new(parsed.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string))
}
