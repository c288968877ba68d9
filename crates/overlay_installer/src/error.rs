use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InstallerError>;

/// Errors surfaced to the operator running the installer.
///
/// Every variant's message is meant to be shown as-is next to the status line.
#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("Download failed ({url}): {reason}")]
    Network { url: String, reason: String },

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown game version (SHA256 {hash})")]
    UnknownVersion { hash: String },

    #[error("No backup found at {0}; the patch does not appear to be installed")]
    BackupMissing(Utf8PathBuf),

    #[error("The patch is already installed; uninstall it first")]
    AlreadyInstalled,

    #[error("{path} is not a valid game folder: {missing} not found")]
    InvalidGameFolder { path: Utf8PathBuf, missing: String },

    #[error("Archive entry '{0}' would be written outside the game folder")]
    UnsafeArchivePath(String),

    #[error("Version check has not been run")]
    NotChecked,

    #[error("No report webhook configured")]
    ReportUnavailable,

    #[error(transparent)]
    Engine(#[from] overlay_engine::Error),
}

impl InstallerError {
    pub fn network(url: &str, reason: impl ToString) -> Self {
        InstallerError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
