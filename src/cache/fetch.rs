//! Fetch collaborator: turns a URL into a raw byte stream.
//!
//! The cache never talks HTTP itself; it pulls bytes through this seam.
//! Retries, backoff and timeouts all live on this side of the boundary,
//! not in the cache.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;

/// A stream of raw response bytes.
///
/// Transport errors surface as stream items and abort the transfer.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Per-request configuration, handed through to the transport
/// unmodified on every fetch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchOptions {
    /// Extra request headers, applied in order
    pub headers: Vec<(String, String)>,

    /// Overall request timeout
    pub timeout: Option<Duration>,
}

/// Fetches a remote resource as a byte stream
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<ByteStream>;
}

/// Default [`Fetcher`] backed by a shared `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client, e.g. one with a custom connection pool
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<ByteStream> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed())
    }
}
