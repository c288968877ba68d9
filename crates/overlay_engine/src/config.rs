//! Engine configuration.
//!
//! Loaded from TOML (or JSON, by extension):
//!
//! ```toml
//! base_url = "https://cdn.example.com/overlay"
//! data_root = "overlay-data"
//!
//! [[artifacts]]
//! name = "dialogue"
//! kind = "dialogue_database"
//! strategy = "version_marker"
//! manifest = "dialogue/version.txt"
//! payload = "dialogue/tr.json"
//! ```

use crate::descriptor::{ArtifactDescriptor, ArtifactKind, SyncStrategy};
use crate::error::{Error, Result};
use crate::integrity::FingerprintAlgorithm;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix for relative artifact URLs.
    pub base_url: String,
    /// Root of the per-artifact local directories.
    pub data_root: Utf8PathBuf,
    pub manifest_timeout_secs: u64,
    pub payload_timeout_secs: u64,
    /// Readiness / host poll interval. Clamped to 100..=500 ms.
    pub poll_interval_ms: u64,
    /// How long to wait for the host to produce its original content.
    pub host_wait_timeout_secs: u64,
    pub user_agent: String,
    pub fingerprint: FingerprintAlgorithm,
    pub artifacts: Vec<ArtifactConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            data_root: Utf8PathBuf::from("overlay-data"),
            manifest_timeout_secs: 10,
            payload_timeout_secs: 15,
            poll_interval_ms: MIN_POLL_INTERVAL_MS,
            host_wait_timeout_secs: 30,
            user_agent: format!("overlay-engine/{}", env!("CARGO_PKG_VERSION")),
            fingerprint: FingerprintAlgorithm::default(),
            artifacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub name: String,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub strategy: SyncStrategy,
    /// Version marker location. Required for `version_marker`.
    #[serde(default)]
    pub manifest: Option<String>,
    pub payload: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EngineConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_std_path())?;
        let config = match path.extension() {
            Some("json") => Self::from_json_str(&contents)?,
            _ => Self::from_toml_str(&contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn payload_timeout(&self) -> Duration {
        Duration::from_secs(self.payload_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }

    pub fn host_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.host_wait_timeout_secs)
    }

    /// Check names are unique and usable as directory names, and that every
    /// marker-synced artifact has a manifest.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for artifact in &self.artifacts {
            let name = artifact.name.as_str();
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(Error::Config(format!("invalid artifact name '{}'", name)));
            }
            if !seen.insert(name) {
                return Err(Error::Config(format!("duplicate artifact '{}'", name)));
            }
            if artifact.strategy == SyncStrategy::VersionMarker && artifact.manifest.is_none() {
                return Err(Error::Config(format!(
                    "artifact '{}' uses version_marker but has no manifest",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Descriptors for every enabled artifact, in configuration order.
    pub fn descriptors(&self) -> Vec<ArtifactDescriptor> {
        self.artifacts
            .iter()
            .filter(|a| a.enabled)
            .map(|a| self.descriptor(a))
            .collect()
    }

    /// Names of artifacts switched off with `enabled = false`.
    pub fn disabled_artifacts(&self) -> impl Iterator<Item = &str> {
        self.artifacts
            .iter()
            .filter(|a| !a.enabled)
            .map(|a| a.name.as_str())
    }

    fn descriptor(&self, artifact: &ArtifactConfig) -> ArtifactDescriptor {
        ArtifactDescriptor::new(
            artifact.name.clone(),
            artifact.kind,
            artifact.strategy,
            artifact.manifest.as_deref().map(|m| self.resolve_url(m)),
            self.resolve_url(&artifact.payload),
            self.data_root.join(&artifact.name),
        )
    }

    /// Absolute URLs pass through; anything else is joined onto `base_url`.
    pub fn resolve_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            location.trim_start_matches('/')
        )
    }
}
