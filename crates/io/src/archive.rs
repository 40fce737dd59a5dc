//! Packager: bundle datasets into one zip archive.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// One file to pack, stored under `name` inside the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into() }
    }
}

/// Entries are stored deflated with a fixed timestamp and mode so identical
/// inputs give identical archives.
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Pack every present entry into `archive`, then delete the packed source
/// files. Missing entries are skipped with a warning; it is an error only if
/// none are present. Returns the names that were packed.
pub fn pack(archive: &Path, entries: &[ArchiveEntry]) -> Result<Vec<String>, String> {
    let present: Vec<&ArchiveEntry> = entries
        .iter()
        .filter(|e| {
            let exists = e.path.is_file();
            if !exists {
                log::warn!("{} not found, archiving without it", e.path.display());
            }
            exists
        })
        .collect();
    if present.is_empty() {
        return Err(format!("nothing to archive into {}", archive.display()));
    }

    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
    }
    let file = File::create(archive).map_err(|e| format!("cannot create {}: {e}", archive.display()))?;
    let mut zip = ZipWriter::new(file);

    for entry in &present {
        let data = fs::read(&entry.path).map_err(|e| format!("{}: {e}", entry.path.display()))?;
        zip.start_file(entry.name.as_str(), entry_options())
            .map_err(|e| format!("zip error on {}: {e}", entry.name))?;
        zip.write_all(&data)
            .map_err(|e| format!("zip write error on {}: {e}", entry.name))?;
    }
    zip.finish().map_err(|e| format!("zip finish error: {e}"))?;

    for entry in &present {
        fs::remove_file(&entry.path)
            .map_err(|e| format!("cannot remove {}: {e}", entry.path.display()))?;
    }

    let names: Vec<String> = present.iter().map(|e| e.name.clone()).collect();
    log::info!("archived {} into {}", names.join(", "), archive.display());
    Ok(names)
}

/// Entry names of an existing archive, in stored order.
pub fn list_entries(archive: &Path) -> Result<Vec<String>, String> {
    let file = File::open(archive).map_err(|e| format!("{}: {e}", archive.display()))?;
    let zip = ZipArchive::new(file).map_err(|e| format!("{}: not a zip archive: {e}", archive.display()))?;
    Ok(zip.file_names().map(str::to_string).collect())
}
