//! Table of game builds the patch supports.
//!
//! Published as JSON mapping a version label to the SHA-256 of the game file used
//! for detection:
//!
//! ```json
//! { "1.0.3": "9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08" }
//! ```

use crate::error::Result;
use overlay_engine::Fetcher;
use serde::de::Error as _;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownHashTable {
    /// `(version, hash)` in document order.
    versions: Vec<(String, String)>,
}

impl KnownHashTable {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(bytes)?;
        let mut versions = Vec::with_capacity(map.len());
        for (version, hash) in map {
            let hash = hash.as_str().ok_or_else(|| {
                serde_json::Error::custom(format!("hash for version '{}' is not a string", version))
            })?;
            versions.push((version, hash.trim().to_string()));
        }
        Ok(Self { versions })
    }

    /// Download and parse the table.
    pub fn fetch(fetcher: &dyn Fetcher, url: &str, timeout: Duration) -> Result<Self> {
        let bytes = fetcher.fetch(url, timeout)?;
        let table = Self::from_json_slice(&bytes)?;
        info!("Loaded {} known game versions", table.len());
        Ok(table)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.version_for(hash).is_some()
    }

    /// First version whose hash matches, ignoring case.
    pub fn version_for(&self, hash: &str) -> Option<&str> {
        let hash = hash.trim();
        self.versions
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(hash))
            .map(|(version, _)| version.as_str())
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
