//! Writes a server's backup sources into a zip container.

use crate::fs::walker::collect_sources;
use crate::utils::errors::Result;
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What ended up in an artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Archive the managed directories and root config files of `server_dir`
/// into a new file at `dest`, synced to disk before returning.
///
/// Blocking. On error `dest` may hold a partial container; the caller owns
/// its removal.
pub fn write_archive(server_dir: &Path, dest: &Path, compression_level: u8) -> Result<ArchiveSummary> {
    let sources = collect_sources(server_dir)?;

    let output = File::create(dest)?;
    let mut zip = ZipWriter::new(output);
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level.into()));

    let mut summary = ArchiveSummary::default();
    for source in &sources {
        let mut options = base;
        if let Some(mode) = source.mode {
            options = options.unix_permissions(mode);
        }

        if source.is_dir {
            zip.add_directory(source.archive_name.as_str(), options)?;
            summary.directories += 1;
            continue;
        }

        zip.start_file(
            source.archive_name.as_str(),
            options.large_file(source.size >= u64::from(u32::MAX)),
        )?;
        let mut input = File::open(&source.path)?;
        summary.bytes += io::copy(&mut input, &mut zip)?;
        summary.files += 1;
    }

    let output = zip.finish()?;
    output.sync_all()?;
    Ok(summary)
}
