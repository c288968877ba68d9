//! Artifact identity.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Host-native format of an artifact, which selects its [`ContentCodec`](crate::codec::ContentCodec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Dialogue database export (conversations of dialogue entries).
    DialogueDatabase,
    /// Localized text table (field id -> text per language).
    TextTable,
    /// Flat object-path -> text map.
    TextMap,
    /// The engine's own [`ContentDocument`](crate::document::ContentDocument) JSON.
    Document,
}

/// How the engine decides whether the remote artifact changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Compare a published version marker with the local one.
    #[default]
    VersionMarker,
    /// Download the payload and compare fingerprints.
    PayloadDigest,
}

/// Identifies one syncable unit. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDescriptor {
    name: String,
    kind: ArtifactKind,
    strategy: SyncStrategy,
    manifest_url: Option<String>,
    payload_url: String,
    dir: Utf8PathBuf,
}

impl ArtifactDescriptor {
    /// Create a descriptor whose local files live in `dir`.
    ///
    /// `manifest_url` is only consulted by [`SyncStrategy::VersionMarker`].
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        strategy: SyncStrategy,
        manifest_url: Option<String>,
        payload_url: impl Into<String>,
        dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            strategy,
            manifest_url,
            payload_url: payload_url.into(),
            dir: dir.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn manifest_url(&self) -> Option<&str> {
        self.manifest_url.as_deref()
    }

    pub fn payload_url(&self) -> &str {
        &self.payload_url
    }

    /// Directory holding all local files of this artifact.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Last-known version marker (or payload digest).
    pub fn marker_path(&self) -> Utf8PathBuf {
        self.dir.join("version.txt")
    }

    /// Raw downloaded payload.
    pub fn payload_path(&self) -> Utf8PathBuf {
        self.dir.join("payload.json")
    }

    /// Host-original export. Written once, never overwritten.
    pub fn original_path(&self) -> Utf8PathBuf {
        self.dir.join("original.json")
    }

    /// Merged overlay served to the host.
    pub fn overlay_path(&self) -> Utf8PathBuf {
        self.dir.join("overlay.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_paths_are_colocated() {
        let d = ArtifactDescriptor::new(
            "dialogue",
            ArtifactKind::DialogueDatabase,
            SyncStrategy::VersionMarker,
            Some("https://example.invalid/version.txt".to_string()),
            "https://example.invalid/db.json",
            "/data/overlay/dialogue",
        );

        assert_eq!(d.marker_path(), Utf8PathBuf::from("/data/overlay/dialogue/version.txt"));
        assert_eq!(d.payload_path(), Utf8PathBuf::from("/data/overlay/dialogue/payload.json"));
        assert_eq!(d.original_path(), Utf8PathBuf::from("/data/overlay/dialogue/original.json"));
        assert_eq!(d.overlay_path(), Utf8PathBuf::from("/data/overlay/dialogue/overlay.json"));
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&ArtifactKind::DialogueDatabase).unwrap(),
            "\"dialogue_database\""
        );
        assert_eq!(
            serde_json::to_string(&SyncStrategy::PayloadDigest).unwrap(),
            "\"payload_digest\""
        );
    }
}
