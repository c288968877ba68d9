//! Steam library discovery, used to suggest an initial game folder.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::OnceLock;
use sysinfo::Disks;
use tracing::debug;

fn numbered_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^"\d+"$"#).expect("valid regex"))
}

fn path_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^"path"\s+"(.+)"$"#).expect("valid regex"))
}

/// Steam install root from the Windows registry.
fn steam_root_from_registry() -> Option<Utf8PathBuf> {
    if cfg!(not(target_os = "windows")) {
        return None;
    }

    let output = std::process::Command::new("reg")
        .args(["query", "HKCU\\Software\\Valve\\Steam", "/v", "SteamPath"])
        .output()
        .ok()?;
    let stdout = String::from_utf8(output.stdout).ok()?;

    stdout
        .lines()
        .filter(|line| line.contains("SteamPath") && line.contains("REG_SZ"))
        .find_map(|line| line.split("REG_SZ").nth(1))
        .map(|path| Utf8PathBuf::from(path.trim().replace('/', "\\")))
}

/// Per-OS default locations, plus `Steam` on every mounted drive on Windows.
fn steam_root_candidates() -> Vec<Utf8PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(target_os = "windows") {
        let disks = Disks::new_with_refreshed_list();
        for disk in disks.iter() {
            if let Some(mount) = disk.mount_point().to_str() {
                let root = Utf8PathBuf::from(mount.trim_end_matches(['\\', '/']));
                candidates.push(root.join("Program Files (x86)").join("Steam"));
                candidates.push(root.join("Steam"));
            }
        }
    } else if let Ok(home) = std::env::var("HOME") {
        let home = Utf8PathBuf::from(home);
        if cfg!(target_os = "macos") {
            candidates.push(home.join("Library/Application Support/Steam"));
        } else {
            candidates.push(home.join(".steam/steam"));
            candidates.push(home.join(".local/share/Steam"));
        }
    }

    candidates
}

/// Locate the Steam installation directory.
pub fn find_steam_root() -> Option<Utf8PathBuf> {
    steam_root_from_registry()
        .filter(|p| p.is_dir())
        .or_else(|| steam_root_candidates().into_iter().find(|p| p.is_dir()))
}

/// Library paths listed in `libraryfolders.vdf`.
///
/// Only `"path"` keys inside numbered blocks are considered.
pub fn parse_library_folders(vdf: &str) -> Vec<Utf8PathBuf> {
    let lines: Vec<&str> = vdf.lines().map(str::trim).collect();
    let mut folders = Vec::new();
    let mut inside_block = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if numbered_block().is_match(line) && lines.get(i + 1) == Some(&"{") {
            inside_block = true;
            i += 2;
            continue;
        }
        if inside_block {
            if line == "}" {
                inside_block = false;
            } else if let Some(caps) = path_line().captures(line) {
                let path = Utf8PathBuf::from(caps[1].replace("\\\\", "\\"));
                if !folders.contains(&path) {
                    folders.push(path);
                }
            }
        }
        i += 1;
    }

    folders
}

/// The Steam root followed by every additional library that exists.
pub fn library_folders(steam_root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut folders = vec![steam_root.to_path_buf()];
    let vdf = steam_root.join("steamapps").join("libraryfolders.vdf");
    if let Ok(contents) = fs::read_to_string(vdf.as_std_path()) {
        for folder in parse_library_folders(&contents) {
            if folder.is_dir() && !folders.contains(&folder) {
                folders.push(folder);
            }
        }
    }
    folders
}

/// First `steamapps/common/<dir>` in `libraries` containing `game_exe`.
pub fn find_game_folder(libraries: &[Utf8PathBuf], game_exe: &str) -> Option<Utf8PathBuf> {
    for library in libraries {
        let common = library.join("steamapps").join("common");
        let Ok(entries) = fs::read_dir(common.as_std_path()) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(dir) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if dir.join(game_exe).is_file() {
                debug!("Found {} in {}", game_exe, dir);
                return Some(dir);
            }
        }
    }
    None
}

/// Auto-detect the game folder from the local Steam installation.
pub fn detect_game_folder(game_exe: &str) -> Option<Utf8PathBuf> {
    let root = find_steam_root()?;
    find_game_folder(&library_folders(&root), game_exe)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VDF: &str = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
		"apps"
		{
			"228980"		"398136946"
		}
	}
	"1"
	{
		"path"		"E:\\SteamLibrary"
	}
}
"#;

    #[test]
    fn test_parse_library_folders() {
        let folders = parse_library_folders(VDF);
        assert_eq!(
            folders,
            vec![
                Utf8PathBuf::from("C:\\Program Files (x86)\\Steam"),
                Utf8PathBuf::from("E:\\SteamLibrary"),
            ]
        );
    }

    #[test]
    fn test_find_game_folder() {
        let dir = tempfile::tempdir().unwrap();
        let library = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let game = library.join("steamapps/common/Kindergarten 3");
        fs::create_dir_all(&game).unwrap();
        fs::create_dir_all(library.join("steamapps/common/Other")).unwrap();
        fs::write(game.join("Kindergarten3.exe"), b"").unwrap();

        let found = find_game_folder(&[library.clone()], "Kindergarten3.exe");
        assert_eq!(found, Some(game));
        assert!(find_game_folder(&[library], "Missing.exe").is_none());
    }

    #[test]
    fn test_library_folders_starts_with_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        assert_eq!(library_folders(&root), vec![root]);
    }
}
