//! Left join of normalized expense records against the registry.

use crate::model::{
    JoinedExpenseRecord, NormalizedExpenseRecord, CNPJ_NOT_FOUND, LEGAL_NAME_NOT_LOCATED,
    STATE_UNDETERMINED,
};
use crate::registry::Registry;
use crate::validate::quality_flags;

/// Clean a join key: drop an integral float suffix (`123.0`), keep only
/// digits, parse. Anything unparseable (including overflow) is 0.
pub fn clean_key(raw: &str) -> u64 {
    let trimmed = raw.trim();
    let integral = match trimmed.rsplit_once(['.', ',']) {
        Some((whole, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => whole,
        _ => trimmed,
    };
    let digits: String = integral.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Registry text, or `sentinel` when the registry cell is blank.
fn or_sentinel(value: &str, sentinel: &str) -> String {
    if value.trim().is_empty() {
        sentinel.to_string()
    } else {
        value.to_string()
    }
}

/// Counters from one join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
}

/// Join every record (order preserved) with its registry entry, or with the
/// sentinel metadata when the key is unknown, and compute quality flags.
/// Blank CNPJ, legal name or state on a matched entry also take the sentinel.
pub fn reconcile(
    records: &[NormalizedExpenseRecord],
    registry: &Registry,
) -> (Vec<JoinedExpenseRecord>, JoinStats) {
    let joined: Vec<JoinedExpenseRecord> = records
        .iter()
        .map(|record| {
            let key = clean_key(&record.registry_key);
            let amount = record.amount.unwrap_or(0);
            let (cnpj, legal_name, modality, state, matched) = match registry.get(key) {
                Some(entry) => (
                    or_sentinel(&entry.cnpj, CNPJ_NOT_FOUND),
                    or_sentinel(&entry.legal_name, LEGAL_NAME_NOT_LOCATED),
                    entry.modality.clone(),
                    or_sentinel(&entry.state, STATE_UNDETERMINED),
                    true,
                ),
                None => (
                    CNPJ_NOT_FOUND.to_string(),
                    LEGAL_NAME_NOT_LOCATED.to_string(),
                    String::new(),
                    STATE_UNDETERMINED.to_string(),
                    false,
                ),
            };
            let flags = quality_flags(&cnpj, &legal_name, amount);
            JoinedExpenseRecord {
                registry_key: key,
                cnpj,
                legal_name,
                modality,
                state,
                quarter: record.quarter,
                year: record.year,
                amount,
                matched,
                flags,
            }
        })
        .collect();

    let matched = joined.iter().filter(|j| j.matched).count();
    let stats = JoinStats { matched, unmatched: joined.len() - matched };
    if stats.unmatched > 0 {
        log::warn!(
            "{} of {} expense records have no registry entry",
            stats.unmatched,
            records.len()
        );
    }
    (joined, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Quarter, RawTable};

    fn registry() -> Registry {
        let rows = vec![
            vec!["123456", "11.222.333/0001-81", "ALFA SAUDE", "Medicina de Grupo", "PE"],
            vec!["654321", "11111111111111", "BETA", "Cooperativa", "SP"],
            vec!["222222", "  ", "", "Autogestao", " "],
        ];
        Registry::from_table(&RawTable::new(
            ["REGISTRO_OPERADORA", "CNPJ", "RAZAO_SOCIAL", "MODALIDADE", "UF"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        ))
        .unwrap()
    }

    fn record(key: &str, amount: Option<i64>) -> NormalizedExpenseRecord {
        NormalizedExpenseRecord {
            registry_key: key.into(),
            year: 2023,
            quarter: Quarter::Q1,
            amount,
            suspicious: false,
        }
    }

    #[test]
    fn clean_key_variants() {
        assert_eq!(clean_key("123456"), 123456);
        assert_eq!(clean_key(" 12.345-6 "), 123456);
        assert_eq!(clean_key("123456.0"), 123456);
        assert_eq!(clean_key("123456,00"), 123456);
        assert_eq!(clean_key(""), 0);
        assert_eq!(clean_key("abc"), 0);
        assert_eq!(clean_key("99999999999999999999999"), 0);
    }

    #[test]
    fn every_record_is_joined_exactly_once() {
        let records = vec![
            record("123456", Some(1_000_000)),
            record("999999", Some(2_000_000)),
            record("654321", None),
            record("", Some(3_000_000)),
        ];
        let (joined, stats) = reconcile(&records, &registry());
        assert_eq!(joined.len(), records.len());
        assert_eq!(stats, JoinStats { matched: 2, unmatched: 2 });
        let keys: Vec<u64> = joined.iter().map(|j| j.registry_key).collect();
        assert_eq!(keys, vec![123456, 999999, 654321, 0]);
    }

    #[test]
    fn matched_record_carries_registry_metadata() {
        let (joined, _) = reconcile(&[record("123456", Some(5_000_000))], &registry());
        let j = &joined[0];
        assert!(j.matched);
        assert_eq!(j.legal_name, "ALFA SAUDE");
        assert_eq!(j.modality, "Medicina de Grupo");
        assert_eq!(j.state, "PE");
        assert!(j.flags.cnpj_is_valid);
        assert!(j.flags.legal_name_is_valid);
        assert!(j.flags.amount_is_valid);
    }

    #[test]
    fn unmatched_record_gets_sentinels_and_invalid_flags() {
        let (joined, _) = reconcile(&[record("777", Some(5_000_000))], &registry());
        let j = &joined[0];
        assert!(!j.matched);
        assert_eq!(j.cnpj, CNPJ_NOT_FOUND);
        assert_eq!(j.legal_name, LEGAL_NAME_NOT_LOCATED);
        assert_eq!(j.state, STATE_UNDETERMINED);
        assert_eq!(j.modality, "");
        assert!(!j.flags.cnpj_is_valid);
        assert!(!j.flags.legal_name_is_valid);
        assert!(j.flags.amount_is_valid);
    }

    #[test]
    fn blank_registry_cells_take_sentinels() {
        let (joined, stats) = reconcile(&[record("222222", Some(5_000_000))], &registry());
        let j = &joined[0];
        assert_eq!(stats.matched, 1);
        assert!(j.matched);
        assert_eq!(j.cnpj, CNPJ_NOT_FOUND);
        assert_eq!(j.legal_name, LEGAL_NAME_NOT_LOCATED);
        assert_eq!(j.state, STATE_UNDETERMINED);
        assert_eq!(j.modality, "Autogestao");
        assert!(!j.flags.cnpj_is_valid);
        assert!(!j.flags.legal_name_is_valid);
    }

    #[test]
    fn unparseable_amount_is_coerced_to_zero() {
        let (joined, _) = reconcile(&[record("654321", None)], &registry());
        assert_eq!(joined[0].amount, 0);
        assert!(!joined[0].flags.amount_is_valid);
        // repeated digits
        assert!(!joined[0].flags.cnpj_is_valid);
    }
}
