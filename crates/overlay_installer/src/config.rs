use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Installer settings, read from the `[installer]` table of the tool config.
///
/// ```toml
/// [installer]
/// game_name = "Kindergarten 3"
/// game_exe = "Kindergarten3.exe"
/// verify_file = "Kindergarten3_Data/Managed/Assembly-CSharp.dll"
/// known_hashes_url = "https://cdn.example.com/patch/hashes.json"
/// release_url_template = "https://cdn.example.com/patch/{version}.zip"
/// cleanup_paths = ["BepInEx", "doorstop_config.ini", "winhttp.dll"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub game_name: String,
    /// Executable that must exist in the game folder.
    pub game_exe: String,
    /// Game file, relative to the game folder, whose hash identifies the build.
    pub verify_file: Utf8PathBuf,
    pub known_hashes_url: String,
    /// Patch archive URL; `{version}` is replaced by the detected version.
    pub release_url_template: String,
    pub backup_dir_name: String,
    /// Paths the patch adds, removed on uninstall.
    pub cleanup_paths: Vec<String>,
    pub report_webhook: Option<String>,
    pub request_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            game_name: String::new(),
            game_exe: String::new(),
            verify_file: Utf8PathBuf::new(),
            known_hashes_url: String::new(),
            release_url_template: String::new(),
            backup_dir_name: "backup".to_string(),
            cleanup_paths: Vec::new(),
            report_webhook: None,
            request_timeout_secs: 15,
            download_timeout_secs: 600,
            user_agent: format!("overlay-installer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl InstallerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn release_url(&self, version: &str) -> String {
        self.release_url_template.replace("{version}", version)
    }

    /// File name of `verify_file`, as shown in version reports.
    pub fn verify_file_name(&self) -> &str {
        self.verify_file.file_name().unwrap_or(self.verify_file.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_release_url() {
        let config: InstallerConfig = serde_json::from_str(
            r#"{
                "game_name": "Kindergarten 3",
                "verify_file": "Data/Managed/Assembly-CSharp.dll",
                "release_url_template": "https://cdn.example.com/{version}.zip"
            }"#,
        )
        .unwrap();

        assert_eq!(config.backup_dir_name, "backup");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(
            config.release_url("1.0.3"),
            "https://cdn.example.com/1.0.3.zip"
        );
        assert_eq!(config.verify_file_name(), "Assembly-CSharp.dll");
    }
}
