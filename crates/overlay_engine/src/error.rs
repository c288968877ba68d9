//! Error types for overlay operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. External error types (`std::io::Error`, `serde_json::Error`)
//! are automatically converted via `From` impls.
//!
//! Errors never cross into the host's read path. The background pipeline catches
//! them at each stage boundary and records their [`ErrorKind`] in
//! [`ReadinessState::Failed`](crate::readiness::ReadinessState::Failed).

use serde::Serialize;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while syncing, merging or caching an artifact.
#[derive(Error, Debug)]
pub enum Error {
    /// A fetch timed out, could not connect, or returned a non-success status.
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Neither the local nor the remote marker could be determined.
    #[error("Cannot determine whether '{artifact}' needs a sync: {reason}")]
    IntegrityUnresolvable { artifact: String, reason: String },

    /// A document did not match the shape its codec expects.
    #[error("Failed to parse {what} for '{artifact}': {reason}")]
    Parse {
        artifact: String,
        what: &'static str,
        reason: String,
    },

    /// Local filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization of engine-owned state failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The host's read accessor has not produced content yet.
    #[error("Host content for '{0}' is not available")]
    HostStateUnavailable(String),

    /// The readiness state machine was asked to make an illegal move.
    #[error("Invalid readiness transition for '{artifact}': {from} -> {to}")]
    InvalidTransition {
        artifact: String,
        from: String,
        to: String,
    },

    /// The engine configuration is malformed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Catch-all for errors from collaborators.
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

/// Coarse classification of an [`Error`], recorded when an artifact fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Network,
    IntegrityUnresolvable,
    Parse,
    Io,
    HostStateUnavailable,
    Internal,
}

impl Error {
    /// Shorthand for building a [`Error::Parse`].
    pub fn parse(artifact: &str, what: &'static str, reason: impl ToString) -> Self {
        Error::Parse {
            artifact: artifact.to_string(),
            what,
            reason: reason.to_string(),
        }
    }

    /// Shorthand for building a [`Error::Network`].
    pub fn network(url: &str, reason: impl ToString) -> Self {
        Error::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::IntegrityUnresolvable { .. } => ErrorKind::IntegrityUnresolvable,
            Error::Parse { .. } | Error::Json(_) => ErrorKind::Parse,
            Error::Io(_) => ErrorKind::Io,
            Error::HostStateUnavailable(_) => ErrorKind::HostStateUnavailable,
            Error::InvalidTransition { .. } | Error::Config(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::IntegrityUnresolvable => "integrity-unresolvable",
            ErrorKind::Parse => "parse",
            ErrorKind::Io => "io",
            ErrorKind::HostStateUnavailable => "host-state-unavailable",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::network("https://x/version.txt", "timed out").kind(),
            ErrorKind::Network
        );
        assert_eq!(
            Error::parse("dialogue", "patch", "missing field").kind(),
            ErrorKind::Parse
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).kind(), ErrorKind::Io);
        assert_eq!(
            Error::HostStateUnavailable("dialogue".into()).kind(),
            ErrorKind::HostStateUnavailable
        );
        assert_eq!(Error::from("boom".to_string()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::network("https://x/version.txt", "status 404");
        assert_eq!(
            err.to_string(),
            "Network error fetching https://x/version.txt: status 404"
        );
    }
}
