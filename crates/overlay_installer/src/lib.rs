//! Installer for packaged content patches.
//!
//! Identifies the installed game build by hashing a known game file, then
//! installs (download, back up, extract) or uninstalls (restore, clean up) the
//! patch archive for that build. Builds missing from the known-hash table can be
//! reported upstream instead.

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod hashing;
pub mod known_hashes;
pub mod report;
pub mod session;
pub mod steam;

pub use config::InstallerConfig;
pub use download::DownloadProgress;
pub use error::{InstallerError, Result};
pub use hashing::hash_file;
pub use known_hashes::KnownHashTable;
pub use report::VersionReport;
pub use session::{
    validate_game_folder, InstallStatus, InstallSummary, InstallerSession, InstallerView,
    UninstallSummary,
};
pub use steam::detect_game_folder;
