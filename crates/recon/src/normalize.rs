//! Schema normalization: one raw table in, canonical expense records out.
//!
//! Column resolution runs a static alias table top to bottom; each rule
//! claims at most one column so two source columns can never collide on the
//! same canonical field. A file without a description, value, or key column
//! is rejected as a whole (no records, not an error).

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::amount::{normalize_locale_column, parse_decimal_micros};
use crate::classify::{resolve_column, ColumnRule, HeaderPattern::*};
use crate::model::{NormalizedExpenseRecord, Quarter, RawTable};
use crate::period::{parse_period_date, period_from_path, period_of};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What to do with rows whose amount is missing, zero, or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositivityPolicy {
    /// Exclude the row.
    #[default]
    StrictDrop,
    /// Keep the row with `suspicious = true`.
    FlagSuspicious,
}

impl fmt::Display for PositivityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrictDrop => write!(f, "strict_drop"),
            Self::FlagSuspicious => write!(f, "flag_suspicious"),
        }
    }
}

impl FromStr for PositivityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "strict_drop" | "strict" => Ok(Self::StrictDrop),
            "flag_suspicious" | "flag" => Ok(Self::FlagSuspicious),
            other => Err(format!(
                "unknown positivity policy '{other}' (expected strict_drop or flag_suspicious)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CanonicalField {
    Key,
    PeriodDate,
    Value,
    Description,
    Account,
}

/// Evaluated in this order. Final-balance value aliases sit in a tier above
/// the movement/raw-value fallbacks.
const ALIAS_RULES: &[(CanonicalField, ColumnRule)] = &[
    (
        CanonicalField::Key,
        ColumnRule { tiers: &[&[Exact("REG_ANS"), Exact("CD_OPERADORA")]], exclude: &[] },
    ),
    (
        CanonicalField::PeriodDate,
        ColumnRule { tiers: &[&[Exact("DT_REGISTRO"), Exact("DATA")]], exclude: &[] },
    ),
    (
        CanonicalField::Value,
        ColumnRule {
            tiers: &[
                &[Exact("VL_SALDO_FINAL"), Exact("VALOR_SALDO_FINAL"), Exact("SALDO_FINAL")],
                &[Exact("VALOR"), Exact("VL_MOVIMENTO")],
            ],
            exclude: &[],
        },
    ),
    (
        CanonicalField::Description,
        ColumnRule { tiers: &[&[Exact("DESCRICAO"), Exact("NM_CONTA")]], exclude: &[] },
    ),
    (
        CanonicalField::Account,
        ColumnRule { tiers: &[&[Exact("CD_CONTA_CONTABIL")]], exclude: &[] },
    ),
];

/// Key fallback when no key alias is present: a "code" marker in the name.
const KEY_FALLBACK: ColumnRule = ColumnRule {
    tiers: &[&[Contains("COD"), Contains("CD_")]],
    exclude: &[],
};

const EXPENSE_PATTERN: &str =
    r"(?i)despesas?\s+com\s+eventos?|despesas?\s+com\s+sinistros?|eventos?\s*/\s*sinistros?";

fn expense_filter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EXPENSE_PATTERN).expect("expense pattern is valid"))
}

/// Whether a description names claim/event expenses.
pub fn is_expense_description(description: &str) -> bool {
    expense_filter().is_match(description)
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a whole file produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    MissingDescription,
    MissingValue,
    MissingKey,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDescription => write!(f, "no description column"),
            Self::MissingValue => write!(f, "no value column"),
            Self::MissingKey => write!(f, "no key column"),
        }
    }
}

/// Per-file row accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowStats {
    pub rows_read: usize,
    pub rows_matched: usize,
    pub dropped_period: usize,
    pub dropped_amount: usize,
    pub flagged_suspicious: usize,
    pub used_path_period: bool,
    pub brazilian_numbers: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<NormalizedExpenseRecord>,
    pub rejection: Option<Rejection>,
    pub stats: RowStats,
}

impl NormalizeOutcome {
    fn rejected(reason: Rejection, rows_read: usize) -> Self {
        Self {
            records: Vec::new(),
            rejection: Some(reason),
            stats: RowStats { rows_read, ..RowStats::default() },
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

struct ResolvedColumns {
    key: usize,
    period: Option<usize>,
    value: usize,
    description: usize,
}

fn resolve_columns(headers: &[String]) -> Result<ResolvedColumns, Rejection> {
    let mut claimed: Vec<usize> = Vec::new();
    let mut key = None;
    let mut period = None;
    let mut value = None;
    let mut description = None;

    for (field, rule) in ALIAS_RULES {
        let Some(idx) = resolve_column(headers, rule, &claimed, field_name(*field)) else {
            continue;
        };
        claimed.push(idx);
        match field {
            CanonicalField::Key => key = Some(idx),
            CanonicalField::PeriodDate => period = Some(idx),
            CanonicalField::Value => value = Some(idx),
            CanonicalField::Description => description = Some(idx),
            CanonicalField::Account => {}
        }
    }

    let description = description.ok_or(Rejection::MissingDescription)?;
    let value = value.ok_or(Rejection::MissingValue)?;
    let key = match key {
        Some(idx) => idx,
        None => resolve_column(headers, &KEY_FALLBACK, &claimed, "key")
            .ok_or(Rejection::MissingKey)?,
    };

    Ok(ResolvedColumns { key, period, value, description })
}

fn field_name(field: CanonicalField) -> &'static str {
    match field {
        CanonicalField::Key => "key",
        CanonicalField::PeriodDate => "period-date",
        CanonicalField::Value => "value",
        CanonicalField::Description => "description",
        CanonicalField::Account => "account",
    }
}

/// Keep the digits of a key cell. An integral float rendering (`123456.0`)
/// loses its fractional zeros first.
fn key_digits(raw: &str) -> String {
    let trimmed = raw.trim();
    let integral = match trimmed.split_once(['.', ',']) {
        Some((whole, frac)) if frac.bytes().all(|b| b == b'0') => whole,
        _ => trimmed,
    };
    integral.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize one source table. `source` is the file's path, used only for
/// the directory-based period fallback.
pub fn normalize_table(
    table: &RawTable,
    source: &Path,
    policy: PositivityPolicy,
) -> NormalizeOutcome {
    let headers = table.normalized_headers();
    let rows_read = table.rows.len();

    let cols = match resolve_columns(&headers) {
        Ok(cols) => cols,
        Err(reason) => return NormalizeOutcome::rejected(reason, rows_read),
    };

    let matching: Vec<&Vec<String>> = table
        .rows
        .iter()
        .filter(|row| is_expense_description(&row[cols.description]))
        .collect();

    let mut stats = RowStats {
        rows_read,
        rows_matched: matching.len(),
        ..RowStats::default()
    };
    if matching.is_empty() {
        return NormalizeOutcome { records: Vec::new(), rejection: None, stats };
    }

    // Period: per-row dates when at least one parses, else the path for all.
    let mut periods: Vec<Option<(i32, Quarter)>> = match cols.period {
        Some(idx) => matching
            .iter()
            .map(|row| parse_period_date(&row[idx]).map(period_of))
            .collect(),
        None => vec![None; matching.len()],
    };
    if periods.iter().all(Option::is_none) {
        let fallback = period_from_path(source);
        stats.used_path_period = fallback.is_some();
        periods = vec![fallback; matching.len()];
    }

    let mut values: Vec<String> = matching.iter().map(|row| row[cols.value].clone()).collect();
    stats.brazilian_numbers = normalize_locale_column(&mut values);

    let mut records = Vec::with_capacity(matching.len());
    for ((row, period), value) in matching.iter().zip(periods).zip(values) {
        let Some((year, quarter)) = period else {
            stats.dropped_period += 1;
            log::debug!("{}: dropped row, no period", source.display());
            continue;
        };

        let amount = parse_decimal_micros(&value);
        let positive = matches!(amount, Some(a) if a > 0);
        let suspicious = match policy {
            PositivityPolicy::StrictDrop => {
                if !positive {
                    stats.dropped_amount += 1;
                    log::debug!("{}: dropped row, amount '{value}'", source.display());
                    continue;
                }
                false
            }
            PositivityPolicy::FlagSuspicious => !positive,
        };
        if suspicious {
            stats.flagged_suspicious += 1;
        }

        records.push(NormalizedExpenseRecord {
            registry_key: key_digits(&row[cols.key]),
            year,
            quarter,
            amount,
            suspicious,
        });
    }

    NormalizeOutcome { records, rejection: None, stats }
}
