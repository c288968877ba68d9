//! Content fingerprints and the "does this artifact need a sync" decision.
//!
//! Two comparison strategies are supported, selected per artifact through
//! [`SyncStrategy`](crate::descriptor::SyncStrategy):
//!
//! - **Version marker**: compare a small published marker (`version.txt`) with the
//!   locally stored one. Cheap; requires the remote to publish a marker.
//! - **Payload digest**: download the payload and compare its fingerprint with the
//!   fingerprint of the local copy. No marker needed, but every check costs a
//!   full download.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Hash function used to fingerprint payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintAlgorithm {
    /// 256-bit SHA-2 digest, hex encoded. Auditable against published hashes.
    #[default]
    Sha256,
    /// 64-bit xxHash3. Equality detection only.
    Xxh3,
}

/// A lowercase hex-encoded content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint `bytes` with the given algorithm.
pub fn digest_with(algorithm: FingerprintAlgorithm, bytes: &[u8]) -> Fingerprint {
    let hex = match algorithm {
        FingerprintAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        FingerprintAlgorithm::Xxh3 => format!("{:016x}", xxh3_64(bytes)),
    };
    Fingerprint(hex)
}

/// SHA-256 fingerprint of `bytes`.
pub fn digest(bytes: &[u8]) -> Fingerprint {
    digest_with(FingerprintAlgorithm::Sha256, bytes)
}

/// Normalize a marker read from disk or the network.
///
/// Markers are compared after trimming surrounding whitespace (a trailing newline
/// in a published `version.txt` must not force a re-sync). Returns `None` for an
/// empty marker.
pub fn normalize_marker(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Returns `true` if the local artifact must be re-synced.
///
/// A sync is needed when either side is absent or the two differ. Comparison is
/// case-insensitive so upper- and lower-case hex digests compare equal.
pub fn needs_sync(local: Option<&str>, remote: Option<&str>) -> bool {
    match (local, remote) {
        (Some(local), Some(remote)) => !local.trim().eq_ignore_ascii_case(remote.trim()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            digest(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_xxh3_is_16_hex_chars() {
        let fp = digest_with(FingerprintAlgorithm::Xxh3, b"abc");
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_detects_change() {
        assert_eq!(digest(b"payload"), digest(b"payload"));
        assert_ne!(digest(b"payload"), digest(b"payload2"));
    }

    #[test]
    fn test_needs_sync() {
        assert!(needs_sync(None, Some("2.1")));
        assert!(needs_sync(Some("2.1"), None));
        assert!(needs_sync(None, None));
        assert!(needs_sync(Some("2.0"), Some("2.1")));
        assert!(!needs_sync(Some("2.1"), Some("2.1")));
        assert!(!needs_sync(Some("2.1\n"), Some(" 2.1")));
        assert!(!needs_sync(Some("ABCDEF"), Some("abcdef")));
    }

    #[test]
    fn test_normalize_marker() {
        assert_eq!(normalize_marker("  2.1\r\n"), Some("2.1".to_string()));
        assert_eq!(normalize_marker("\u{feff}3.0"), Some("3.0".to_string()));
        assert_eq!(normalize_marker("   \n"), None);
    }
}
