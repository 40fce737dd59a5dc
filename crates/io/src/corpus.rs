//! Raw corpus discovery.
//!
//! Files are returned in lexicographic path order so that a rerun over the
//! same tree consolidates records in the same order.

use std::path::{Path, PathBuf};

use healthops_recon::RawTable;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Spreadsheet,
}

impl SourceKind {
    /// Classify by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Delimited),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn read(&self) -> Result<RawTable, String> {
        match self.kind {
            SourceKind::Delimited => crate::csv::import(&self.path),
            SourceKind::Spreadsheet => crate::xlsx::import(&self.path),
        }
    }
}

/// Walk `root` and collect every supported file, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<SourceFile>, String> {
    if !root.is_dir() {
        return Err(format!("corpus directory not found: {}", root.display()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("skipping unreadable corpus entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match SourceKind::from_path(entry.path()) {
            Some(kind) => files.push(SourceFile { path: entry.into_path(), kind }),
            None => log::debug!("ignoring {}", entry.path().display()),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
