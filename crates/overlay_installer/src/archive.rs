//! Backup, extraction and restore of a patch archive over a game folder.

use crate::error::{InstallerError, Result};
use camino::Utf8Path;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Relative path of an archive entry, refusing anything that escapes the target.
fn entry_path(enclosed: Option<PathBuf>, name: &str) -> Result<PathBuf> {
    enclosed.ok_or_else(|| InstallerError::UnsafeArchivePath(name.to_string()))
}

/// Refuse the archive if any entry would land outside the game folder.
///
/// Run before anything is written so a bad archive leaves no trace.
pub fn check_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        entry_path(file.enclosed_name(), file.name())?;
    }
    Ok(())
}

/// Topmost ancestor of `target` below `game_dir` that does not exist yet.
fn highest_missing(game_dir: &Path, target: &Path) -> Option<PathBuf> {
    target
        .ancestors()
        .take_while(|p| *p != game_dir && p.starts_with(game_dir))
        .filter(|p| !p.exists())
        .last()
        .map(Path::to_path_buf)
}

/// Copy every game file the archive is about to overwrite into `backup_dir`.
///
/// `backup_dir` is created even if nothing needs backing up: its presence marks
/// the patch as installed.
pub fn backup_existing<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    game_dir: &Utf8Path,
    backup_dir: &Utf8Path,
) -> Result<usize> {
    fs::create_dir_all(backup_dir.as_std_path())?;

    let mut backed_up = 0;
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let relative = entry_path(file.enclosed_name(), file.name())?;
        let existing = game_dir.as_std_path().join(&relative);
        if !existing.is_file() {
            continue;
        }

        let backup = backup_dir.as_std_path().join(&relative);
        if let Some(parent) = backup.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&existing, &backup)?;
        debug!("Backed up {}", relative.display());
        backed_up += 1;
    }

    info!("Backed up {} file(s) to {}", backed_up, backup_dir);
    Ok(backed_up)
}

/// Extract every entry over `game_dir`. Returns the number of files written.
///
/// Files and directories that did not exist before are appended to `created`,
/// also when extraction stops halfway, so a caller can remove them again.
pub fn extract_over<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    game_dir: &Utf8Path,
    created: &mut Vec<PathBuf>,
) -> Result<usize> {
    let mut written = 0;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let target = game_dir
            .as_std_path()
            .join(entry_path(file.enclosed_name(), file.name())?);
        if let Some(missing) = highest_missing(game_dir.as_std_path(), &target) {
            if !created.iter().any(|c| missing.starts_with(c)) {
                created.push(missing);
            }
        }

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut file, &mut out)?;
        written += 1;
    }

    info!("Extracted {} file(s) into {}", written, game_dir);
    Ok(written)
}

/// Delete paths recorded by [`extract_over`], newest first. Returns how many
/// were removed.
pub fn remove_created(created: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in created.iter().rev() {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else if path.exists() {
            fs::remove_file(path)
        } else {
            continue;
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    removed
}

/// Copy every file under `backup_dir` back to the same relative path in `game_dir`.
pub fn restore_backup(backup_dir: &Utf8Path, game_dir: &Utf8Path) -> Result<usize> {
    let mut restored = 0;
    for entry in WalkDir::new(backup_dir.as_std_path()) {
        let entry = entry.map_err(|e| {
            InstallerError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("filesystem loop in backup directory")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(backup_dir.as_std_path()) else {
            continue;
        };
        let target = game_dir.as_std_path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        restored += 1;
    }

    info!("Restored {} file(s) from {}", restored, backup_dir);
    Ok(restored)
}

fn is_contained(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Delete files or directories the patch added, relative to `game_dir`.
///
/// Missing paths are skipped. Paths that would leave the game folder are refused.
pub fn remove_paths(game_dir: &Utf8Path, paths: &[String]) -> Result<usize> {
    let mut removed = 0;
    for path in paths {
        let relative = Path::new(path);
        if path.is_empty() || !is_contained(relative) {
            warn!("Refusing to remove '{}' outside the game folder", path);
            continue;
        }

        let target = game_dir.as_std_path().join(relative);
        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        } else if target.exists() {
            fs::remove_file(&target)?;
        } else {
            continue;
        }
        debug!("Removed {}", target.display());
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        ZipArchive::new(Cursor::new(zip.finish().unwrap().into_inner())).unwrap()
    }

    fn root(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_backup_only_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let game = root(&dir);
        fs::create_dir_all(game.join("Data")).unwrap();
        fs::write(game.join("Data/strings.json"), b"original").unwrap();

        let mut zip = archive(&[("Data/strings.json", "patched"), ("winhttp.dll", "loader")]);
        let backup = game.join("backup");
        assert_eq!(backup_existing(&mut zip, &game, &backup).unwrap(), 1);
        assert_eq!(fs::read(backup.join("Data/strings.json")).unwrap(), b"original");
        assert!(!backup.join("winhttp.dll").exists());
    }

    #[test]
    fn test_backup_dir_created_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let game = root(&dir);
        let mut zip = archive(&[("new.txt", "x")]);
        backup_existing(&mut zip, &game, &game.join("backup")).unwrap();
        assert!(game.join("backup").is_dir());
    }

    #[test]
    fn test_extract_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let game = root(&dir);
        let mut zip = archive(&[("../escape.txt", "x")]);
        assert!(matches!(
            check_entries(&mut zip),
            Err(InstallerError::UnsafeArchivePath(_))
        ));
        assert!(matches!(
            extract_over(&mut zip, &game, &mut Vec::new()),
            Err(InstallerError::UnsafeArchivePath(_))
        ));
    }

    #[test]
    fn test_extract_records_only_new_paths() {
        let dir = tempfile::tempdir().unwrap();
        let game = root(&dir);
        fs::create_dir_all(game.join("Data")).unwrap();
        fs::write(game.join("Data/strings.json"), b"original").unwrap();

        let mut zip = archive(&[
            ("Data/strings.json", "patched"),
            ("Data/fonts/tr.ttf", "font"),
            ("BepInEx/plugins/a.dll", "a"),
            ("BepInEx/plugins/b.dll", "b"),
        ]);
        let mut created = Vec::new();
        assert_eq!(extract_over(&mut zip, &game, &mut created).unwrap(), 4);
        assert_eq!(
            created,
            vec![
                game.join("Data/fonts").into_std_path_buf(),
                game.join("BepInEx").into_std_path_buf(),
            ]
        );

        assert_eq!(remove_created(&created), 2);
        assert!(!game.join("BepInEx").exists());
        assert!(!game.join("Data/fonts").exists());
        assert_eq!(fs::read(game.join("Data/strings.json")).unwrap(), b"patched");
    }

    #[test]
    fn test_remove_paths_refuses_escape() {
        let dir = tempfile::tempdir().unwrap();
        let game = root(&dir);
        fs::create_dir_all(game.join("BepInEx/plugins")).unwrap();
        fs::write(game.join("changelog.txt"), b"x").unwrap();

        let removed = remove_paths(
            &game,
            &[
                "BepInEx".to_string(),
                "changelog.txt".to_string(),
                "missing.ini".to_string(),
                "../outside".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(removed, 2);
        assert!(!game.join("BepInEx").exists());
        assert!(!game.join("changelog.txt").exists());
    }
}
