//! Interactive install flow over one game folder.
//!
//! The session is driven step by step by a front end (the CLI here): pick a
//! folder, run the version check, then install, uninstall or report. After every
//! step [`InstallerSession::view`] tells the front end what to show and which
//! actions to enable.

use crate::archive::{
    backup_existing, check_entries, extract_over, remove_created, remove_paths, restore_backup,
};
use crate::config::InstallerConfig;
use crate::download::{download_to, DownloadProgress};
use crate::error::{InstallerError, Result};
use crate::hashing::hash_file;
use crate::known_hashes::KnownHashTable;
use crate::report::VersionReport;
use camino::{Utf8Path, Utf8PathBuf};
use overlay_engine::Fetcher;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{info, warn};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Unchecked,
    NotInstalled,
    Installed,
    UnknownVersion,
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InstallStatus::Unchecked => "not checked",
            InstallStatus::NotInstalled => "not installed",
            InstallStatus::Installed => "installed",
            InstallStatus::UnknownVersion => "unknown game version",
        };
        f.write_str(text)
    }
}

/// What the front end should display after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallerView {
    pub status: InstallStatus,
    pub install_enabled: bool,
    pub uninstall_enabled: bool,
    pub report_visible: bool,
    pub detected_version: Option<String>,
    pub file_hash: Option<String>,
}

impl InstallerView {
    pub fn status_line(&self) -> String {
        match (&self.status, &self.detected_version) {
            (InstallStatus::Installed, Some(version)) => {
                format!("Patch installed (game version {})", version)
            }
            (InstallStatus::NotInstalled, Some(version)) => {
                format!("Ready to install (game version {})", version)
            }
            (InstallStatus::UnknownVersion, _) => {
                "Unknown game version: the patch may not be compatible. Please report it."
                    .to_string()
            }
            (status, _) => format!("Status: {}", status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionCheck {
    hash: String,
    version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InstallSummary {
    pub backed_up: usize,
    pub extracted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UninstallSummary {
    pub restored: usize,
    pub removed: usize,
}

/// `game_dir` must contain both the executable and the file used for detection.
pub fn validate_game_folder(game_dir: &Utf8Path, config: &InstallerConfig) -> Result<()> {
    let required = [config.game_exe.as_str(), config.verify_file.as_str()];
    for relative in required.into_iter().filter(|r| !r.is_empty()) {
        if !game_dir.join(relative).is_file() {
            return Err(InstallerError::InvalidGameFolder {
                path: game_dir.to_path_buf(),
                missing: relative.to_string(),
            });
        }
    }
    Ok(())
}

pub struct InstallerSession {
    config: InstallerConfig,
    game_dir: Utf8PathBuf,
    client: reqwest::blocking::Client,
    check: Option<VersionCheck>,
}

impl InstallerSession {
    /// Open a session for `game_dir`, validating it first.
    pub fn new(config: InstallerConfig, game_dir: impl Into<Utf8PathBuf>) -> Result<Self> {
        let game_dir = game_dir.into();
        validate_game_folder(&game_dir, &config)?;

        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| InstallerError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            game_dir,
            client,
            check: None,
        })
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn game_dir(&self) -> &Utf8Path {
        &self.game_dir
    }

    pub fn backup_dir(&self) -> Utf8PathBuf {
        self.game_dir.join(&self.config.backup_dir_name)
    }

    /// The backup directory exists only while the patch is installed.
    pub fn is_installed(&self) -> bool {
        self.backup_dir().is_dir()
    }

    /// Hash the detection file and look it up in `table`.
    pub fn check(&mut self, table: &KnownHashTable) -> Result<InstallerView> {
        let hash = hash_file(&self.game_dir.join(&self.config.verify_file))?;
        let version = table.version_for(&hash).map(str::to_string);

        match &version {
            Some(version) => info!("Detected game version {} ({})", version, hash),
            None => warn!("Game file hash {} matches no known version", hash),
        }

        self.check = Some(VersionCheck { hash, version });
        Ok(self.view())
    }

    /// Download the known-hash table and run [`check`](Self::check).
    pub fn check_online(&mut self, fetcher: &dyn Fetcher) -> Result<InstallerView> {
        let table = KnownHashTable::fetch(
            fetcher,
            &self.config.known_hashes_url,
            self.config.request_timeout(),
        )?;
        self.check(&table)
    }

    pub fn status(&self) -> InstallStatus {
        match &self.check {
            None => InstallStatus::Unchecked,
            Some(VersionCheck { version: None, .. }) => InstallStatus::UnknownVersion,
            Some(_) if self.is_installed() => InstallStatus::Installed,
            Some(_) => InstallStatus::NotInstalled,
        }
    }

    pub fn view(&self) -> InstallerView {
        let status = self.status();
        InstallerView {
            status,
            install_enabled: status == InstallStatus::NotInstalled,
            uninstall_enabled: status == InstallStatus::Installed,
            report_visible: status == InstallStatus::UnknownVersion,
            detected_version: self.check.as_ref().and_then(|c| c.version.clone()),
            file_hash: self.check.as_ref().map(|c| c.hash.clone()),
        }
    }

    /// Version to install, refusing unchecked, unknown or already patched games.
    fn installable_version(&self) -> Result<String> {
        let check = self.check.as_ref().ok_or(InstallerError::NotChecked)?;
        let version = check
            .version
            .clone()
            .ok_or_else(|| InstallerError::UnknownVersion {
                hash: check.hash.clone(),
            })?;
        if self.is_installed() {
            return Err(InstallerError::AlreadyInstalled);
        }
        Ok(version)
    }

    /// Download the release for the detected version and install it.
    ///
    /// The archive goes to a temporary file that is deleted afterwards.
    pub fn install(
        &mut self,
        progress: &mut dyn FnMut(DownloadProgress),
    ) -> Result<InstallSummary> {
        let version = self.installable_version()?;
        let url = self.config.release_url(&version);

        let mut archive_file = tempfile::Builder::new()
            .prefix("overlay-patch-")
            .suffix(".zip")
            .tempfile()?;
        download_to(
            &self.client,
            &url,
            archive_file.as_file_mut(),
            self.config.download_timeout(),
            progress,
        )?;

        let summary = self.apply_archive(archive_file.reopen()?)?;
        archive_file.close()?;
        Ok(summary)
    }

    /// Install from an archive already on disk.
    pub fn install_from_archive(&mut self, archive: &Utf8Path) -> Result<InstallSummary> {
        self.installable_version()?;
        self.apply_archive(File::open(archive.as_std_path())?)
    }

    /// Back up, then extract. Any failure leaves the folder as it was, and in
    /// particular without a backup directory, so the game never reads as
    /// installed after a failed attempt.
    fn apply_archive(&self, file: File) -> Result<InstallSummary> {
        let mut archive = ZipArchive::new(file)?;
        check_entries(&mut archive)?;
        let backup_dir = self.backup_dir();

        let backed_up = match backup_existing(&mut archive, &self.game_dir, &backup_dir) {
            Ok(backed_up) => backed_up,
            Err(e) => {
                warn!("Backup failed, discarding it: {}", e);
                if let Err(remove) = fs::remove_dir_all(backup_dir.as_std_path()) {
                    warn!("Failed to remove {}: {}", backup_dir, remove);
                }
                return Err(e);
            }
        };

        let mut created = Vec::new();
        let extracted = match extract_over(&mut archive, &self.game_dir, &mut created) {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("Extraction failed, restoring backup: {}", e);
                if let Err(restore) = self.rollback(&backup_dir, &created) {
                    warn!("Rollback incomplete: {}", restore);
                }
                return Err(e);
            }
        };

        info!(
            "Installed patch into {} ({} backed up, {} extracted)",
            self.game_dir, backed_up, extracted
        );
        Ok(InstallSummary {
            backed_up,
            extracted,
        })
    }

    fn rollback(&self, backup_dir: &Utf8Path, created: &[PathBuf]) -> Result<()> {
        let removed = remove_created(created);
        info!("Removed {} path(s) added by the failed install", removed);
        restore_backup(backup_dir, &self.game_dir)?;
        fs::remove_dir_all(backup_dir.as_std_path())?;
        Ok(())
    }

    /// Restore backed-up files, drop the backup and remove patch-only files.
    pub fn uninstall(&mut self) -> Result<UninstallSummary> {
        let backup_dir = self.backup_dir();
        if !backup_dir.is_dir() {
            return Err(InstallerError::BackupMissing(backup_dir));
        }

        let restored = restore_backup(&backup_dir, &self.game_dir)?;
        fs::remove_dir_all(backup_dir.as_std_path())?;
        let removed = remove_paths(&self.game_dir, &self.config.cleanup_paths)?;

        info!(
            "Uninstalled patch from {} ({} restored, {} removed)",
            self.game_dir, restored, removed
        );
        Ok(UninstallSummary { restored, removed })
    }

    /// Report for the checked game file.
    pub fn report(&self) -> Result<VersionReport> {
        let check = self.check.as_ref().ok_or(InstallerError::NotChecked)?;
        Ok(VersionReport::new(
            &self.config.game_name,
            self.config.verify_file_name(),
            &check.hash,
        ))
    }

    /// Send [`report`](Self::report) to the configured webhook.
    pub fn send_report(&self) -> Result<VersionReport> {
        let webhook = self
            .config
            .report_webhook
            .as_deref()
            .filter(|w| !w.is_empty())
            .ok_or(InstallerError::ReportUnavailable)?;
        let report = self.report()?;
        report.send(&self.client, webhook)?;
        Ok(report)
    }
}
