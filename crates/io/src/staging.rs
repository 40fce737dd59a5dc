//! Consolidated expense dataset: written incrementally, one source file at a
//! time, then read back from its archive by the validation stage.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use healthops_recon::amount::{format_micros, parse_decimal_micros};
use healthops_recon::{NormalizedExpenseRecord, Quarter};

pub const CONSOLIDATED_HEADER: &[&str] = &["registryKey", "quarter", "year", "amount", "suspicious"];

const DELIMITER: u8 = b';';

/// Append-only writer for the staging dataset.
///
/// Any file already at `path` is removed on creation. The underlying file is
/// only created once the first non-empty batch arrives, so a run that accepts
/// no rows leaves nothing behind.
pub struct ConsolidatedWriter {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: usize,
}

impl ConsolidatedWriter {
    pub fn create(path: &Path) -> Result<Self, String> {
        if path.exists() {
            fs::remove_file(path)
                .map_err(|e| format!("cannot remove stale {}: {e}", path.display()))?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
        }
        Ok(Self { path: path.to_path_buf(), writer: None, rows: 0 })
    }

    /// Append one file's records and flush them to disk.
    pub fn append(&mut self, records: &[NormalizedExpenseRecord]) -> Result<(), String> {
        if records.is_empty() {
            return Ok(());
        }
        let writer = match &mut self.writer {
            Some(w) => w,
            slot @ None => slot.insert(open_staging(&self.path)?),
        };

        for record in records {
            let year = record.year.to_string();
            let amount = record.amount.map(format_micros).unwrap_or_default();
            let fields: [&str; 5] = [
                &record.registry_key,
                record.quarter.label(),
                &year,
                &amount,
                if record.suspicious { "true" } else { "false" },
            ];
            writer
                .write_record(fields)
                .map_err(|e| format!("CSV write error: {e}"))?;
        }
        writer.flush().map_err(|e| format!("CSV flush error: {e}"))?;
        self.rows += records.len();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the file. Returns the number of rows written.
    pub fn finish(mut self) -> Result<usize, String> {
        if let Some(mut w) = self.writer.take() {
            w.flush().map_err(|e| format!("CSV flush error: {e}"))?;
        }
        Ok(self.rows)
    }
}

fn open_staging(path: &Path) -> Result<csv::Writer<File>, String> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .map_err(|e| format!("cannot create {}: {e}", path.display()))?;
    w.write_record(CONSOLIDATED_HEADER)
        .map_err(|e| format!("CSV write error: {e}"))?;
    Ok(w)
}

/// Decode a staging dataset.
pub fn read_consolidated(reader: impl Read) -> Result<Vec<NormalizedExpenseRecord>, String> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, result) in csv.records().enumerate() {
        let line = i + 2;
        let record = result.map_err(|e| format!("CSV parse error at line {line}: {e}"))?;
        if record.len() < CONSOLIDATED_HEADER.len() {
            return Err(format!(
                "line {line} has {} columns, expected {}",
                record.len(),
                CONSOLIDATED_HEADER.len()
            ));
        }

        let quarter: Quarter = record[1]
            .parse()
            .map_err(|e| format!("line {line}: {e}"))?;
        let year: i32 = record[2]
            .parse()
            .map_err(|e| format!("line {line}: invalid year '{}': {e}", &record[2]))?;
        let amount = if record[3].is_empty() {
            None
        } else {
            Some(
                parse_decimal_micros(&record[3])
                    .ok_or_else(|| format!("line {line}: invalid amount '{}'", &record[3]))?,
            )
        };
        let suspicious = match &record[4] {
            "true" => true,
            "false" => false,
            other => return Err(format!("line {line}: invalid flag '{other}'")),
        };

        records.push(NormalizedExpenseRecord {
            registry_key: record[0].to_string(),
            year,
            quarter,
            amount,
            suspicious,
        });
    }
    Ok(records)
}

/// Read the staging dataset stored as `entry` inside a zip archive.
pub fn read_consolidated_archive(
    archive: &Path,
    entry: &str,
) -> Result<Vec<NormalizedExpenseRecord>, String> {
    let file = File::open(archive).map_err(|e| format!("{}: {e}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| format!("{}: not a zip archive: {e}", archive.display()))?;
    let dataset = zip
        .by_name(entry)
        .map_err(|e| format!("{}: no entry '{entry}': {e}", archive.display()))?;
    read_consolidated(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(key: &str, amount: Option<i64>, suspicious: bool) -> NormalizedExpenseRecord {
        NormalizedExpenseRecord {
            registry_key: key.into(),
            year: 2023,
            quarter: Quarter::Q2,
            amount,
            suspicious,
        }
    }

    #[test]
    fn header_written_once_across_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/consolidado.csv");
        let mut writer = ConsolidatedWriter::create(&path).unwrap();
        writer.append(&[record("123456", Some(1_500_000), false)]).unwrap();
        writer.append(&[]).unwrap();
        writer.append(&[record("654321", None, true)]).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "registryKey;quarter;year;amount;suspicious\n\
             123456;2T;2023;1.50;false\n\
             654321;2T;2023;;true\n"
        );
    }

    #[test]
    fn stale_file_is_removed_and_empty_run_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("consolidado.csv");
        fs::write(&path, "old").unwrap();
        let writer = ConsolidatedWriter::create(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(writer.finish().unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn written_dataset_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("consolidado.csv");
        let original = vec![
            record("00321", Some(1_234_567_891), false),
            record("654321", Some(-5_000_000), true),
            record("1", None, true),
        ];
        let mut writer = ConsolidatedWriter::create(&path).unwrap();
        writer.append(&original).unwrap();
        writer.finish().unwrap();

        let back = read_consolidated(File::open(&path).unwrap()).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn malformed_dataset_is_error() {
        let text = "registryKey;quarter;year;amount;suspicious\n1;5T;2023;1.00;false\n";
        let err = read_consolidated(text.as_bytes()).unwrap_err();
        assert!(err.contains("line 2"), "{err}");
    }
}
