#![allow(dead_code)]

use async_trait::async_trait;
use backup_core::fs::ops::{FsOps, TokioFs};
use backup_core::BackupService;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

pub const SERVER: &str = "survival";

/// A data directory holding one populated server.
pub struct Fixture {
    pub dir: TempDir,
    pub server_dir: PathBuf,
    pub backups_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path().join("servers").join(SERVER);
        let server_dir = root.join("server");
        let backups_dir = root.join("backups");

        write(&server_dir.join("universe/worlds/default/region.bin"), "region-v1")?;
        write(&server_dir.join("universe/players.json"), "[]")?;
        write(&server_dir.join("config/permissions.yml"), "admins: []")?;
        write(&server_dir.join("mods/example.jar"), "mod-v1")?;
        write(&server_dir.join("logs/latest.log"), "started")?;
        write(&server_dir.join("settings.json"), r#"{"motd":"v1"}"#)?;
        write(&server_dir.join("server.properties"), "port=5520")?;
        write(&server_dir.join("server.jar"), "binary")?;

        Ok(Self {
            dir,
            server_dir,
            backups_dir,
        })
    }

    pub fn service(&self) -> BackupService {
        BackupService::new(self.dir.path())
    }

    pub fn service_with(&self, ops: impl FsOps + 'static) -> BackupService {
        BackupService::new(self.dir.path()).with_ops(Arc::new(ops))
    }
}

pub fn write(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// Relative path -> contents for every file under `dir`.
pub fn snapshot(dir: &Path) -> BTreeMap<String, String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/");
            let contents = std::fs::read_to_string(e.path()).unwrap_or_default();
            (rel, contents)
        })
        .collect()
}

/// Names directly under `dir`.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

type RenameRule = Box<dyn Fn(&Path, &Path) -> Option<io::ErrorKind> + Send + Sync>;
type PathRule = Box<dyn Fn(&Path) -> Option<io::ErrorKind> + Send + Sync>;

/// Real filesystem with failures injected on chosen paths.
#[derive(Default)]
pub struct FaultyFs {
    rename: Option<RenameRule>,
    remove: Option<PathRule>,
    cross_device: bool,
}

impl FaultyFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every rename fails as if source and destination were on different devices.
    pub fn cross_device(mut self) -> Self {
        self.cross_device = true;
        self
    }

    pub fn fail_rename(
        mut self,
        rule: impl Fn(&Path, &Path) -> Option<io::ErrorKind> + Send + Sync + 'static,
    ) -> Self {
        self.rename = Some(Box::new(rule));
        self
    }

    pub fn fail_remove(mut self, rule: impl Fn(&Path) -> Option<io::ErrorKind> + Send + Sync + 'static) -> Self {
        self.remove = Some(Box::new(rule));
        self
    }
}

#[async_trait]
impl FsOps for FaultyFs {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.cross_device {
            return Err(backup_core::fs::ops::cross_device_error());
        }
        if let Some(kind) = self.rename.as_ref().and_then(|rule| rule(from, to)) {
            return Err(io::Error::from(kind));
        }
        TokioFs.rename(from, to).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        TokioFs.copy(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        if let Some(kind) = self.remove.as_ref().and_then(|rule| rule(path)) {
            return Err(io::Error::from(kind));
        }
        TokioFs.remove_file(path).await
    }
}

/// Whether `path`'s parent directory name starts with `prefix`.
pub fn parent_starts_with(path: &Path, prefix: &str) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .is_some_and(|n| n.to_string_lossy().starts_with(prefix))
}
