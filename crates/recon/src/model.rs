use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Legal name substituted when an expense key has no registry entry.
pub const LEGAL_NAME_NOT_LOCATED: &str = "RAZAO SOCIAL NAO LOCALIZADA";

/// State substituted when an expense key has no registry entry.
pub const STATE_UNDETERMINED: &str = "INDETERMINADO";

/// CNPJ substituted when an expense key has no registry entry.
pub const CNPJ_NOT_FOUND: &str = "NAO ENCONTRADO";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One source file as read from disk: a header row plus text cells.
///
/// Every row has exactly `headers.len()` cells; readers pad short rows with
/// empty strings and drop surplus cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Headers trimmed and uppercased, the form every column rule matches on.
    pub fn normalized_headers(&self) -> Vec<String> {
        self.headers.iter().map(|h| h.trim().to_uppercase()).collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Quarter
// ---------------------------------------------------------------------------

/// Three-month reporting period. Rendered as `1T`..`4T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Quarter {
    #[serde(rename = "1T")]
    Q1,
    #[serde(rename = "2T")]
    Q2,
    #[serde(rename = "3T")]
    Q3,
    #[serde(rename = "4T")]
    Q4,
}

impl Quarter {
    /// `floor((month - 1) / 3) + 1`. `None` outside 1..=12.
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=12 => Self::from_number((month - 1) / 3 + 1),
            _ => None,
        }
    }

    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(Self::Q1),
            2 => Some(Self::Q2),
            3 => Some(Self::Q3),
            4 => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Q1 => "1T",
            Self::Q2 => "2T",
            Self::Q3 => "3T",
            Self::Q4 => "4T",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the label form (`2T`) or the bare number (`2`).
impl FromStr for Quarter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('T')
            .or_else(|| trimmed.strip_suffix('t'))
            .unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::from_number)
            .ok_or_else(|| format!("invalid quarter: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Normalized + joined records
// ---------------------------------------------------------------------------

/// One expense line in canonical form.
///
/// `amount` is in micro-units (1e-6 of the currency unit). It is `None` only
/// when the source value could not be parsed and the positivity policy keeps
/// such rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedExpenseRecord {
    pub registry_key: String,
    pub year: i32,
    pub quarter: Quarter,
    pub amount: Option<i64>,
    /// Set under `FlagSuspicious` when the amount is missing or not positive.
    pub suspicious: bool,
}

/// One regulated entity from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub registry_key: u64,
    pub cnpj: String,
    pub legal_name: String,
    pub trade_name: String,
    pub modality: String,
    pub city: String,
    pub state: String,
}

/// Data-quality flags, always in "is valid" polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityFlags {
    pub cnpj_is_valid: bool,
    pub legal_name_is_valid: bool,
    pub amount_is_valid: bool,
}

/// A normalized record left-joined with its registry entry (or sentinels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedExpenseRecord {
    pub registry_key: u64,
    pub cnpj: String,
    pub legal_name: String,
    pub modality: String,
    pub state: String,
    pub quarter: Quarter,
    pub year: i32,
    /// Micro-units; unparseable amounts are coerced to 0.
    pub amount: i64,
    pub matched: bool,
    pub flags: QualityFlags,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Statistics for one `(legal_name, state)` group, all rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateStat {
    pub legal_name: String,
    pub state: String,
    pub total_cents: i64,
    pub mean_quarterly_cents: i64,
    pub std_dev_quarterly_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_from_every_month() {
        let expected = [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
        for (i, q) in expected.iter().enumerate() {
            let month = i as u32 + 1;
            assert_eq!(Quarter::from_month(month).unwrap().number(), *q, "month {month}");
        }
        assert_eq!(Quarter::from_month(0), None);
        assert_eq!(Quarter::from_month(13), None);
    }

    #[test]
    fn quarter_parses_label_and_number() {
        assert_eq!("3T".parse::<Quarter>().unwrap(), Quarter::Q3);
        assert_eq!("4".parse::<Quarter>().unwrap(), Quarter::Q4);
        assert_eq!(" 1t ".parse::<Quarter>().unwrap(), Quarter::Q1);
        assert!("5T".parse::<Quarter>().is_err());
        assert!("T".parse::<Quarter>().is_err());
    }

    #[test]
    fn raw_table_pads_and_truncates_rows() {
        let table = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into()], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert_eq!(table.rows[0], vec!["1".to_string(), String::new()]);
        assert_eq!(table.rows[1].len(), 2);
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn normalized_headers_are_trimmed_uppercase() {
        let table = RawTable::new(vec![" reg_ans ".into(), "Descricao".into()], vec![]);
        assert_eq!(table.normalized_headers(), vec!["REG_ANS", "DESCRICAO"]);
    }
}
