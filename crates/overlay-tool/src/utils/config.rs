//! Tool configuration (`overlay.toml`).

use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;
use miette::Result;
use overlay_engine::EngineConfig;
use overlay_installer::InstallerConfig;
use serde::{Deserialize, Serialize};
use std::fs;

/// Engine settings at the top level, plus optional `[installer]` and `[log]` tables.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ToolConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub installer: Option<InstallerConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// Write daily-rotated log files in addition to stdout.
    pub file: bool,
    /// Defaults to the per-user data directory.
    pub dir: Option<Utf8PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: true,
            dir: None,
        }
    }
}

impl ToolConfig {
    pub fn parse(contents: &str) -> Result<Self> {
        let config: ToolConfig = toml::from_str(contents).map_err(CliError::config_parse_error)?;
        config
            .engine
            .validate()
            .map_err(CliError::config_parse_error)?;
        Ok(config)
    }

    pub fn installer(&self) -> Result<&InstallerConfig> {
        Ok(self
            .installer
            .as_ref()
            .ok_or(CliError::InstallerNotConfigured)?)
    }
}

/// Load `path`, which must exist.
pub fn load_config(path: &Utf8Path) -> Result<ToolConfig> {
    if !path.is_file() {
        return Err(CliError::ConfigNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let contents = fs::read_to_string(path.as_std_path()).map_err(CliError::config_parse_error)?;
    ToolConfig::parse(&contents)
}

/// Log directory: `[log] dir`, else `<data dir>/overlay-tool/logs`.
pub fn log_dir(config: &LogConfig) -> Option<Utf8PathBuf> {
    if !config.file {
        return None;
    }
    if let Some(dir) = &config.dir {
        return Some(dir.clone());
    }
    let dirs = ProjectDirs::from("", "", "overlay-tool")?;
    Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("logs")).ok()
}
