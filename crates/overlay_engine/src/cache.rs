//! Local persistence and the in-memory overlay cache.
//!
//! Every artifact owns a directory under the configured data root:
//!
//! ```text
//! <data_root>/<artifact>/
//! ├── version.txt     last synced marker (or payload digest)
//! ├── payload.json    raw downloaded patch
//! ├── original.json   host export, written once
//! └── overlay.json    merged result served to the host
//! ```
//!
//! All writes go through a temp file in the same directory followed by a rename,
//! so a reader sees either the previous file or the new one, never a truncated
//! write.

use crate::descriptor::ArtifactDescriptor;
use crate::document::{ContentDocument, Entry};
use crate::error::Result;
use crate::integrity::normalize_marker;
use crate::readiness::Readiness;
use camino::Utf8Path;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    let mut temp = temp_beside(path)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path.as_std_path()).map_err(|e| e.error)?;
    Ok(())
}

fn temp_beside(path: &Utf8Path) -> io::Result<tempfile::NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    std::fs::create_dir_all(dir.as_std_path())?;
    tempfile::NamedTempFile::new_in(dir.as_std_path())
}

fn read_optional(path: &Utf8Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path.as_std_path()) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// On-disk files of one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactFiles {
    descriptor: ArtifactDescriptor,
}

impl ArtifactFiles {
    pub fn new(descriptor: ArtifactDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    /// Last recorded marker, normalized. `None` if absent or empty.
    pub fn read_marker(&self) -> Result<Option<String>> {
        Ok(read_optional(&self.descriptor.marker_path())?
            .and_then(|bytes| normalize_marker(&String::from_utf8_lossy(&bytes))))
    }

    /// Record the marker. Only call after the payload it describes is on disk.
    pub fn write_marker(&self, marker: &str) -> Result<()> {
        write_atomic(&self.descriptor.marker_path(), marker.as_bytes())
    }

    pub fn read_payload(&self) -> Result<Option<Vec<u8>>> {
        read_optional(&self.descriptor.payload_path())
    }

    pub fn write_payload(&self, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.descriptor.payload_path(), bytes)
    }

    pub fn read_original(&self) -> Result<Option<Vec<u8>>> {
        read_optional(&self.descriptor.original_path())
    }

    /// Store the host's original export unless one already exists.
    ///
    /// Returns `true` if this call wrote the file.
    pub fn export_original(&self, bytes: &[u8]) -> Result<bool> {
        let path = self.descriptor.original_path();
        if path.as_std_path().exists() {
            return Ok(false);
        }

        let mut temp = temp_beside(&path)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        match temp.persist_noclobber(path.as_std_path()) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error.into()),
        }
    }

    /// Merged overlay in host-native form.
    pub fn load_overlay(&self) -> Result<Option<Vec<u8>>> {
        read_optional(&self.descriptor.overlay_path())
    }

    pub fn save_overlay(&self, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.descriptor.overlay_path(), bytes)?;
        debug!(
            "Saved overlay for '{}' ({} bytes)",
            self.descriptor.name(),
            bytes.len()
        );
        Ok(())
    }

    pub fn has_overlay(&self) -> bool {
        self.descriptor.overlay_path().as_std_path().is_file()
    }
}

/// A fully materialized overlay. Immutable once built; replaced, never mutated.
#[derive(Debug)]
pub struct CacheEntry {
    descriptor: ArtifactDescriptor,
    marker: Option<String>,
    document: ContentDocument,
    index: HashMap<String, usize>,
    rendered: Vec<u8>,
}

impl CacheEntry {
    /// `rendered` is the host-native encoding of `document`.
    pub fn new(
        descriptor: ArtifactDescriptor,
        marker: Option<String>,
        document: ContentDocument,
        rendered: Vec<u8>,
    ) -> Self {
        let index = document
            .index()
            .into_iter()
            .map(|(key, pos)| (key.to_string(), pos))
            .collect();
        Self {
            descriptor,
            marker,
            document,
            index,
            rendered,
        }
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    pub fn document(&self) -> &ContentDocument {
        &self.document
    }

    /// Host-native bytes, as written to `overlay.json`.
    pub fn rendered(&self) -> &[u8] {
        &self.rendered
    }

    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.index.get(key).map(|&pos| &self.document.entries[pos])
    }

    pub fn field(&self, key: &str, field: &str) -> Option<&str> {
        self.entry(key)?.field(field)
    }
}

/// The artifact name -> readiness slot mapping.
///
/// Populated once from the configured descriptors and read thereafter.
#[derive(Debug, Default)]
pub struct OverlayCache {
    slots: HashMap<String, Arc<Readiness>>,
}

impl OverlayCache {
    pub fn new<'a>(descriptors: impl IntoIterator<Item = &'a ArtifactDescriptor>) -> Self {
        let slots = descriptors
            .into_iter()
            .map(|d| (d.name().to_string(), Arc::new(Readiness::new(d.name()))))
            .collect();
        Self { slots }
    }

    pub fn slot(&self, artifact: &str) -> Option<&Arc<Readiness>> {
        self.slots.get(artifact)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArtifactKind, SyncStrategy};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn files(dir: &TempDir) -> ArtifactFiles {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        ArtifactFiles::new(ArtifactDescriptor::new(
            "ui",
            ArtifactKind::TextMap,
            SyncStrategy::PayloadDigest,
            None,
            "https://example.invalid/ui.json",
            root.join("ui"),
        ))
    }

    #[test]
    fn test_missing_files_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        assert!(files.read_marker().unwrap().is_none());
        assert!(files.read_payload().unwrap().is_none());
        assert!(files.read_original().unwrap().is_none());
        assert!(files.load_overlay().unwrap().is_none());
        assert!(!files.has_overlay());
    }

    #[test]
    fn test_marker_roundtrip_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        files.write_marker("2.1\n").unwrap();
        assert_eq!(files.read_marker().unwrap().as_deref(), Some("2.1"));
    }

    #[test]
    fn test_overwrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        files.save_overlay(b"a much longer first version").unwrap();
        files.save_overlay(b"short").unwrap();
        assert_eq!(files.load_overlay().unwrap().unwrap(), b"short");

        let leftovers = std::fs::read_dir(files.descriptor().dir().as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1, "temp files must not be left behind");
    }

    #[test]
    fn test_original_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(&dir);
        assert!(files.export_original(b"{\"a\":\"first\"}").unwrap());
        assert!(!files.export_original(b"{\"a\":\"second\"}").unwrap());
        assert_eq!(files.read_original().unwrap().unwrap(), b"{\"a\":\"first\"}");
    }

    #[test]
    fn test_cache_entry_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ContentDocument::new(vec![
            Entry::new("k1").with_field("text", "one"),
            Entry::new("k2").with_field("text", "two"),
        ]);
        let entry = CacheEntry::new(
            files(&dir).descriptor().clone(),
            Some("2.1".into()),
            doc,
            b"{}".to_vec(),
        );

        assert_eq!(entry.field("k2", "text"), Some("two"));
        assert!(entry.field("k2", "other").is_none());
        assert!(entry.entry("k3").is_none());
        assert_eq!(entry.marker(), Some("2.1"));
        assert_eq!(entry.rendered(), b"{}");
    }
}
