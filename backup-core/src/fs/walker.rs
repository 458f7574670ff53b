//! Collects the parts of a server data tree that belong in a backup.

use crate::fs::layout::{is_root_config_file, MANAGED_DIRS};
use crate::utils::errors::{BackupError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// An entry to be archived
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path on disk
    pub path: PathBuf,

    /// Archive entry name, `/`-separated and relative to the server directory
    pub archive_name: String,

    /// File size in bytes (0 for directories)
    pub size: u64,

    pub is_dir: bool,

    /// Unix mode bits, when the platform has them
    pub mode: Option<u32>,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Self> {
        let metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        Ok(Self {
            archive_name: archive_name(&path, root),
            path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            is_dir: metadata.is_dir(),
            mode: unix_mode(&metadata),
        })
    }
}

/// Every managed directory (recursively, directories included so empty ones
/// survive a restore) followed by the allow-listed root files.
///
/// A managed directory that does not exist aborts the collection.
pub fn collect_sources(server_dir: &Path) -> Result<Vec<FileInfo>> {
    let mut entries = Vec::new();

    for name in MANAGED_DIRS {
        let dir = server_dir.join(name);
        if !dir.is_dir() {
            return Err(BackupError::SourceMissing(dir));
        }

        // Symlinks are neither followed nor archived.
        for entry in WalkDir::new(&dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let file_type = entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                continue;
            }
            entries.push(FileInfo::from_entry(&entry, server_dir)?);
        }
    }

    entries.extend(collect_root_files(server_dir)?);
    Ok(entries)
}

/// Allow-listed regular files directly under `dir`, sorted by name.
pub fn collect_root_files(dir: &Path) -> Result<Vec<FileInfo>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !is_root_config_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        files.push(FileInfo::from_entry(&entry, dir)?);
    }
    Ok(files)
}

fn archive_name(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn managed_tree() -> std::io::Result<TempDir> {
        let temp_dir = TempDir::new()?;
        for name in MANAGED_DIRS {
            fs::create_dir(temp_dir.path().join(name))?;
        }
        Ok(temp_dir)
    }

    #[test]
    fn test_collects_managed_dirs_and_root_configs() -> Result<()> {
        let temp_dir = managed_tree()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("universe/worlds/default"))?;
        fs::write(root.join("universe/worlds/default/chunk.bin"), b"12345")?;
        fs::write(root.join("settings.json"), b"{}")?;
        fs::write(root.join("server.jar"), b"binary")?;
        fs::create_dir(root.join("assets"))?;
        fs::write(root.join("assets/skin.png"), b"png")?;

        let names: Vec<String> = collect_sources(root)?
            .into_iter()
            .map(|f| f.archive_name)
            .collect();

        assert!(names.contains(&"universe".to_string()));
        assert!(names.contains(&"mods".to_string()));
        assert!(names.contains(&"universe/worlds/default/chunk.bin".to_string()));
        assert!(names.contains(&"settings.json".to_string()));
        assert!(!names.iter().any(|n| n.contains("server.jar")));
        assert!(!names.iter().any(|n| n.starts_with("assets")));
        Ok(())
    }

    #[test]
    fn test_file_sizes_are_recorded() -> Result<()> {
        let temp_dir = managed_tree()?;
        fs::write(temp_dir.path().join("logs/latest.log"), b"1234567")?;

        let files = collect_sources(temp_dir.path())?;
        let log = files
            .iter()
            .find(|f| f.archive_name == "logs/latest.log")
            .unwrap();
        assert_eq!(log.size, 7);
        assert!(!log.is_dir);
        Ok(())
    }

    #[test]
    fn test_missing_managed_dir_aborts() -> std::io::Result<()> {
        let temp_dir = managed_tree()?;
        fs::remove_dir(temp_dir.path().join("mods"))?;

        let err = collect_sources(temp_dir.path()).unwrap_err();
        assert!(matches!(err, BackupError::SourceMissing(p) if p.ends_with("mods")));
        Ok(())
    }
}
