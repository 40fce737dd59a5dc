//! Run report: what each stage read, accepted, dropped and wrote.
//!
//! The same value is printed as pretty JSON on stdout (`--json`) and as a
//! short human summary on stderr.

use std::fmt::Write as _;
use std::path::Path;

use healthops_recon::{Rejection, RowStats};
use serde::Serialize;

use crate::fetch::RegistryOrigin;

/// Why a source file contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileFailure {
    /// The file could not be read or decoded.
    Unreadable { message: String },
    /// A required column could not be resolved.
    Rejected { reason: Rejection },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    pub path: String,
    #[serde(flatten)]
    pub failure: FileFailure,
}

/// Stage A summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidateReport {
    pub files_scanned: usize,
    pub files_accepted: usize,
    pub files_rejected: Vec<RejectedFile>,
    pub rows_read: usize,
    pub rows_matched: usize,
    pub rows_accepted: usize,
    pub rows_dropped_period: usize,
    pub rows_dropped_amount: usize,
    pub rows_flagged_suspicious: usize,
    /// Files whose rows took their period from the directory path.
    pub files_using_path_period: usize,
    /// Consolidated archive written, if any rows were accepted.
    pub archive: Option<String>,
}

impl ConsolidateReport {
    pub(crate) fn add_rows(&mut self, stats: &RowStats, accepted: usize) {
        self.rows_read += stats.rows_read;
        self.rows_matched += stats.rows_matched;
        self.rows_accepted += accepted;
        self.rows_dropped_period += stats.dropped_period;
        self.rows_dropped_amount += stats.dropped_amount;
        self.rows_flagged_suspicious += stats.flagged_suspicious;
        if stats.used_path_period {
            self.files_using_path_period += 1;
        }
    }

    pub(crate) fn reject(&mut self, path: &Path, failure: FileFailure) {
        self.files_rejected.push(RejectedFile { path: path.display().to_string(), failure });
    }
}

/// One written dataset and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub name: String,
    pub rows: usize,
    pub blake3: String,
}

/// Stage B summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateReport {
    pub registry_path: String,
    pub registry_origin: RegistryOrigin,
    pub registry_entries: usize,
    pub registry_duplicates: usize,
    pub records: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub cnpj_invalid: usize,
    pub legal_name_invalid: usize,
    pub amount_invalid: usize,
    pub detailed: Option<DatasetReport>,
    pub aggregate: Option<DatasetReport>,
    pub archive: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidate: Option<ConsolidateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<ValidateReport>,
}

impl RunReport {
    /// Rows that reached the last stage that ran.
    pub fn accepted_rows(&self) -> usize {
        match (&self.validate, &self.consolidate) {
            (Some(v), _) => v.records,
            (None, Some(c)) => c.rows_accepted,
            (None, None) => 0,
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("JSON serialization error: {e}"))
    }

    pub fn human_summary(&self) -> String {
        let mut out = String::new();
        if let Some(c) = &self.consolidate {
            let _ = writeln!(
                out,
                "consolidate: {} files scanned, {} accepted, {} rejected; {} rows accepted of {} matched",
                c.files_scanned,
                c.files_accepted,
                c.files_rejected.len(),
                c.rows_accepted,
                c.rows_matched,
            );
            if c.rows_dropped_period + c.rows_dropped_amount > 0 {
                let _ = writeln!(
                    out,
                    "  dropped: {} without period, {} with unusable amount",
                    c.rows_dropped_period, c.rows_dropped_amount,
                );
            }
            if c.rows_flagged_suspicious > 0 {
                let _ = writeln!(out, "  flagged suspicious: {}", c.rows_flagged_suspicious);
            }
            for rejected in &c.files_rejected {
                let reason = match &rejected.failure {
                    FileFailure::Unreadable { message } => message.clone(),
                    FileFailure::Rejected { reason } => reason.to_string(),
                };
                let _ = writeln!(out, "  skipped {}: {reason}", rejected.path);
            }
            if let Some(archive) = &c.archive {
                let _ = writeln!(out, "  wrote {archive}");
            }
        }
        if let Some(v) = &self.validate {
            let _ = writeln!(
                out,
                "validate: {} records, {} matched, {} unmatched against {} registry entries",
                v.records, v.matched, v.unmatched, v.registry_entries,
            );
            let _ = writeln!(
                out,
                "  invalid: {} cnpj, {} legal name, {} amount",
                v.cnpj_invalid, v.legal_name_invalid, v.amount_invalid,
            );
            for dataset in [&v.detailed, &v.aggregate].into_iter().flatten() {
                let _ = writeln!(out, "  {}: {} rows, blake3 {}", dataset.name, dataset.rows, dataset.blake3);
            }
            if let Some(archive) = &v.archive {
                let _ = writeln!(out, "  wrote {archive}");
            }
        }
        out
    }
}
