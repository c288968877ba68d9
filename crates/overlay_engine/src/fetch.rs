//! Remote artifact retrieval.
//!
//! The engine only needs "give me the bytes at this URL within this time", so
//! transport sits behind the [`Fetcher`] trait. [`HttpFetcher`] is the blocking
//! `reqwest` implementation used in production; tests substitute in-memory fakes.

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Retrieves raw bytes for a URL.
///
/// Implementations must honor `timeout` and map every failure (connect error,
/// timeout, non-success status) to [`Error::Network`].
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| Error::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(url, format!("HTTP {}", status)));
        }

        let bytes = response.bytes().map_err(|e| Error::network(url, e))?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        (**self).fetch(url, timeout)
    }
}
