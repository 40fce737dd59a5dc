//! Detailed and aggregate output datasets.
//!
//! Both are `;`-delimited UTF-8 with `\n` line endings and a fixed column
//! contract. Rendering is deterministic: identical records produce identical
//! bytes, which is what the BLAKE3 fingerprints in the run report rely on.

use std::fs;
use std::io::Write;
use std::path::Path;

use blake3::Hasher;
use healthops_recon::amount::{format_cents, format_micros};
use healthops_recon::{AggregateStat, JoinedExpenseRecord};

pub const DETAILED_HEADER: &[&str] = &[
    "registryKey",
    "cnpj",
    "legalName",
    "modality",
    "state",
    "quarter",
    "year",
    "amount",
    "cnpj_is_valid",
    "legal_name_is_valid",
    "amount_is_valid",
];

pub const AGGREGATE_HEADER: &[&str] = &[
    "legalName",
    "state",
    "totalAmount",
    "meanQuarterlyAmount",
    "stdDevQuarterlyAmount",
];

const DELIMITER: u8 = b';';

/// A dataset written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDataset {
    pub rows: usize,
    pub blake3: String,
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

pub fn write_detailed_csv(records: &[JoinedExpenseRecord], writer: impl Write) -> Result<(), String> {
    let mut csv = csv_writer(writer);
    csv.write_record(DETAILED_HEADER)
        .map_err(|e| format!("CSV write error: {e}"))?;

    for r in records {
        csv.write_record(&[
            r.registry_key.to_string(),
            r.cnpj.clone(),
            r.legal_name.clone(),
            r.modality.clone(),
            r.state.clone(),
            r.quarter.label().to_string(),
            r.year.to_string(),
            format_micros(r.amount),
            flag(r.flags.cnpj_is_valid).to_string(),
            flag(r.flags.legal_name_is_valid).to_string(),
            flag(r.flags.amount_is_valid).to_string(),
        ])
        .map_err(|e| format!("CSV write error: {e}"))?;
    }

    csv.flush().map_err(|e| format!("CSV flush error: {e}"))?;
    Ok(())
}

pub fn write_aggregate_csv(stats: &[AggregateStat], writer: impl Write) -> Result<(), String> {
    let mut csv = csv_writer(writer);
    csv.write_record(AGGREGATE_HEADER)
        .map_err(|e| format!("CSV write error: {e}"))?;

    for s in stats {
        csv.write_record(&[
            s.legal_name.clone(),
            s.state.clone(),
            format_cents(s.total_cents),
            format_cents(s.mean_quarterly_cents),
            format_cents(s.std_dev_quarterly_cents),
        ])
        .map_err(|e| format!("CSV write error: {e}"))?;
    }

    csv.flush().map_err(|e| format!("CSV flush error: {e}"))?;
    Ok(())
}

// ── Hashing ─────────────────────────────────────────────────────────

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

fn write_hashed(path: &Path, rows: usize, buf: Vec<u8>) -> Result<WrittenDataset, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
    }
    let blake3 = hash_bytes(&buf);
    fs::write(path, &buf).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    Ok(WrittenDataset { rows, blake3 })
}

pub fn write_detailed_file(path: &Path, records: &[JoinedExpenseRecord]) -> Result<WrittenDataset, String> {
    let mut buf = Vec::new();
    write_detailed_csv(records, &mut buf)?;
    write_hashed(path, records.len(), buf)
}

pub fn write_aggregate_file(path: &Path, stats: &[AggregateStat]) -> Result<WrittenDataset, String> {
    let mut buf = Vec::new();
    write_aggregate_csv(stats, &mut buf)?;
    write_hashed(path, stats.len(), buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthops_recon::model::QualityFlags;
    use healthops_recon::Quarter;

    fn joined() -> JoinedExpenseRecord {
        JoinedExpenseRecord {
            registry_key: 123456,
            cnpj: "11222333000181".into(),
            legal_name: "ALFA; SAUDE".into(),
            modality: "Medicina de Grupo".into(),
            state: "PE".into(),
            quarter: Quarter::Q3,
            year: 2023,
            amount: 1_234_560_000,
            matched: true,
            flags: QualityFlags {
                cnpj_is_valid: true,
                legal_name_is_valid: true,
                amount_is_valid: false,
            },
        }
    }

    #[test]
    fn test_detailed_format_snapshot() {
        let mut buf = Vec::new();
        write_detailed_csv(&[joined()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "registryKey;cnpj;legalName;modality;state;quarter;year;amount;\
             cnpj_is_valid;legal_name_is_valid;amount_is_valid\n\
             123456;11222333000181;\"ALFA; SAUDE\";Medicina de Grupo;PE;3T;2023;1234.56;true;true;false\n"
        );
    }

    #[test]
    fn test_aggregate_format_snapshot() {
        let stat = AggregateStat {
            legal_name: "ALFA".into(),
            state: "PE".into(),
            total_cents: 60_000,
            mean_quarterly_cents: 20_000,
            std_dev_quarterly_cents: 10_000,
        };
        let mut buf = Vec::new();
        write_aggregate_csv(&[stat], &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "legalName;state;totalAmount;meanQuarterlyAmount;stdDevQuarterlyAmount\n\
             ALFA;PE;600.00;200.00;100.00\n"
        );
    }

    #[test]
    fn test_hash_matches_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detalhado.csv");
        let written = write_detailed_file(&path, &[joined()]).unwrap();
        assert_eq!(written.rows, 1);
        assert_eq!(written.blake3, hash_bytes(&fs::read(&path).unwrap()));
        assert_eq!(written.blake3.len(), 64);
    }

    #[test]
    fn test_empty_aggregate_is_header_only() {
        let mut buf = Vec::new();
        write_aggregate_csv(&[], &mut buf).unwrap();
        assert_eq!(buf, b"legalName;state;totalAmount;meanQuarterlyAmount;stdDevQuarterlyAmount\n");
    }
}
