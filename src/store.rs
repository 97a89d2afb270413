//! Durable catalog of scraped site summaries.
//!
//! A single JSON file maps resource URLs to [`SiteSummary`] records.
//! The store keeps the whole catalog in memory between an explicit
//! `open` and the final `sync`, and only touches disk again when
//! something actually changed.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Catalog format version this build reads and writes.
pub const CATALOG_VERSION: &str = "1";

/// Errors that can occur with the summary store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a catalog file was already opened")]
    AlreadyOpen,

    #[error("a catalog file was not opened yet")]
    NotOpened,

    #[error("failed to read a catalog file: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse a catalog file: {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported catalog file version; loaded-version={found}")]
    UnsupportedVersion { found: String },

    #[error("failed to create a directory: {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize the catalog for: {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to save a catalog file: {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One cached record: scraped metadata plus the optional location of a
/// materialized file inside the cache's item directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    /// Rule-defined metadata fields (title, description, image, ...)
    pub metadata: BTreeMap<String, String>,

    /// When this record was last refreshed
    pub updated_at: DateTime<Utc>,

    /// Path of the cached file, relative to the cache's item directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_file_path: Option<PathBuf>,
}

impl SiteSummary {
    /// Create a summary stamped with the current time
    pub fn new(metadata: BTreeMap<String, String>) -> Self {
        Self {
            metadata,
            updated_at: Utc::now(),
            cached_file_path: None,
        }
    }

    /// Attach the relative path of a file kept in the cache directory
    pub fn with_cached_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cached_file_path = Some(path.into());
        self
    }

    /// Whether this record is still fresh at `now`.
    ///
    /// Without an expiration window a record never goes stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, expiration: Option<Duration>) -> bool {
        match expiration {
            None => true,
            Some(window) => self.updated_at + window >= now,
        }
    }
}

/// The on-disk catalog: a versioned map from resource URL to record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog format version
    pub version: String,

    /// All cataloged summaries, keyed by resource URL
    pub items: HashMap<String, SiteSummary>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a new empty catalog at the current version
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION.to_string(),
            items: HashMap::new(),
        }
    }
}

struct OpenState {
    file_path: PathBuf,
    catalog: Catalog,
    dirty: bool,
}

/// Store for cached site summaries, backed by a single catalog file.
///
/// Every operation except [`open`](Self::open) requires the store to be
/// opened first. The store assumes it is the only writer of its catalog
/// file; two processes sharing one cache directory are not coordinated.
#[derive(Default)]
pub struct CachedSiteSummaryStore {
    state: Option<OpenState>,
}

impl CachedSiteSummaryStore {
    /// Create an unopened store
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Read the catalog file at `file_path` into memory.
    ///
    /// A missing file yields an empty catalog without writing anything;
    /// the file appears on the first dirty [`sync`](Self::sync). A file
    /// with an unknown `version` is rejected outright. If opening fails
    /// the store stays unopened so the call can be retried.
    pub async fn open(&mut self, file_path: impl Into<PathBuf>) -> Result<(), StoreError> {
        if self.state.is_some() {
            return Err(StoreError::AlreadyOpen);
        }
        let file_path = file_path.into();

        let catalog = match fs::read_to_string(&file_path).await {
            Ok(data) => {
                let catalog: Catalog =
                    serde_json::from_str(&data).map_err(|e| StoreError::Parse {
                        path: file_path.clone(),
                        source: e,
                    })?;
                if catalog.version != CATALOG_VERSION {
                    return Err(StoreError::UnsupportedVersion {
                        found: catalog.version,
                    });
                }
                debug!(
                    path = %file_path.display(),
                    items = catalog.items.len(),
                    "opened catalog file"
                );
                catalog
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %file_path.display(), "no catalog file; starting empty");
                Catalog::new()
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: file_path,
                    source: e,
                })
            }
        };

        self.state = Some(OpenState {
            file_path,
            catalog,
            dirty: false,
        });
        Ok(())
    }

    /// Look up the record for `url`, if any
    pub fn find_item(&self, url: &str) -> Result<Option<&SiteSummary>, StoreError> {
        let state = self.state.as_ref().ok_or(StoreError::NotOpened)?;
        Ok(state.catalog.items.get(url))
    }

    /// Insert or overwrite the record for `url` and mark the store dirty
    pub fn update_item(
        &mut self,
        url: impl Into<String>,
        item: SiteSummary,
    ) -> Result<(), StoreError> {
        let state = self.state.as_mut().ok_or(StoreError::NotOpened)?;
        state.catalog.items.insert(url.into(), item);
        state.dirty = true;
        Ok(())
    }

    /// Write the catalog back to disk if anything changed since `open`.
    ///
    /// A clean store performs no I/O at all. On failure the dirty flag
    /// is restored so a later `sync` retries the write instead of
    /// silently dropping updates.
    pub async fn sync(&mut self) -> Result<(), StoreError> {
        let state = self.state.as_mut().ok_or(StoreError::NotOpened)?;
        if !state.dirty {
            return Ok(());
        }

        state.dirty = false;
        let result = write_catalog(&state.file_path, &state.catalog).await;
        if result.is_err() {
            state.dirty = true;
            return result;
        }

        info!(
            path = %state.file_path.display(),
            items = state.catalog.items.len(),
            "synced catalog file"
        );
        Ok(())
    }
}

async fn write_catalog(path: &Path, catalog: &Catalog) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let data = serde_json::to_string_pretty(catalog).map_err(|e| StoreError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, data).await.map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(title: &str) -> SiteSummary {
        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_string(), title.to_string());
        SiteSummary::new(metadata)
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let item = summary("Example").with_cached_file("abc123.png");
        let json = serde_json::to_string(&item).unwrap();

        assert!(json.contains("\"updatedAt\""));
        assert!(json.contains("\"cachedFilePath\""));

        let parsed: SiteSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_summary_omits_absent_cached_path() {
        let json = serde_json::to_string(&summary("Example")).unwrap();
        assert!(!json.contains("cachedFilePath"));
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc::now();
        let mut item = summary("Example");
        item.updated_at = now - Duration::seconds(120);

        // No window: never stale
        assert!(item.is_fresh(now, None));

        assert!(item.is_fresh(now, Some(Duration::seconds(300))));
        assert!(!item.is_fresh(now, Some(Duration::seconds(60))));
    }

    #[test]
    fn test_find_and_update_require_open() {
        let mut store = CachedSiteSummaryStore::new();

        assert!(matches!(
            store.find_item("https://example.com"),
            Err(StoreError::NotOpened)
        ));
        assert!(matches!(
            store.update_item("https://example.com", summary("Example")),
            Err(StoreError::NotOpened)
        ));
    }
}
