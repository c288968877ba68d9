//! The host's read accessor.

use crate::descriptor::ArtifactDescriptor;
use crate::error::{Error, Result};
use camino::Utf8PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Yields the host's current original content for an artifact.
///
/// Returns `None` while the host has not produced it yet (still loading, object
/// not constructed). The engine polls until content appears or it gives up.
pub trait HostContentSource: Send + Sync {
    fn snapshot(&self, artifact: &ArtifactDescriptor) -> Option<Vec<u8>>;
}

impl<F> HostContentSource for F
where
    F: Fn(&ArtifactDescriptor) -> Option<Vec<u8>> + Send + Sync,
{
    fn snapshot(&self, artifact: &ArtifactDescriptor) -> Option<Vec<u8>> {
        self(artifact)
    }
}

/// Reads host exports from `<dir>/<artifact>.json`.
#[derive(Debug, Clone)]
pub struct FileHostSource {
    dir: Utf8PathBuf,
}

impl FileHostSource {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl HostContentSource for FileHostSource {
    fn snapshot(&self, artifact: &ArtifactDescriptor) -> Option<Vec<u8>> {
        let path = self.dir.join(format!("{}.json", artifact.name()));
        match std::fs::read(path.as_std_path()) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read host export {}: {}", path, e);
                }
                None
            }
        }
    }
}

/// Poll `source` until it yields content for `artifact`.
pub fn wait_for_snapshot(
    source: &dyn HostContentSource,
    artifact: &ArtifactDescriptor,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(bytes) = source.snapshot(artifact) {
            return Ok(bytes);
        }
        if Instant::now() >= deadline {
            return Err(Error::HostStateUnavailable(artifact.name().to_string()));
        }
        debug!("Host content for '{}' not available yet", artifact.name());
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArtifactKind, SyncStrategy};
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn descriptor() -> ArtifactDescriptor {
        ArtifactDescriptor::new(
            "scenes",
            ArtifactKind::TextMap,
            SyncStrategy::PayloadDigest,
            None,
            "https://example.invalid/scenes.json",
            "/tmp/scenes",
        )
    }

    #[test]
    fn test_wait_returns_once_available() {
        let calls = AtomicUsize::new(0);
        let source = |_: &ArtifactDescriptor| {
            (calls.fetch_add(1, Ordering::SeqCst) >= 2).then(|| b"{}".to_vec())
        };

        let bytes = wait_for_snapshot(
            &source,
            &descriptor(),
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(bytes, b"{}");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_wait_times_out() {
        let source = |_: &ArtifactDescriptor| -> Option<Vec<u8>> { None };
        let err = wait_for_snapshot(
            &source,
            &descriptor(),
            Duration::from_millis(5),
            Duration::from_millis(20),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HostStateUnavailable);
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = FileHostSource::new(root.clone());
        assert!(source.snapshot(&descriptor()).is_none());

        std::fs::write(root.join("scenes.json"), b"{\"a\":\"b\"}").unwrap();
        assert_eq!(source.snapshot(&descriptor()).unwrap(), b"{\"a\":\"b\"}");
    }
}
