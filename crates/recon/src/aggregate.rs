use std::collections::{BTreeMap, HashMap};

use crate::amount::div_round;
use crate::model::{AggregateStat, JoinedExpenseRecord, Quarter};

const MICROS_PER_CENT: i128 = 10_000;

/// Group accumulator: per-quarter sums in micro-units. Sums are `i128` so
/// any number of `i64` amounts adds without overflow.
#[derive(Default)]
struct Group {
    legal_name: String,
    state: String,
    quarters: BTreeMap<(i32, Quarter), i128>,
}

impl Group {
    fn total_micros(&self) -> i128 {
        self.quarters.values().sum()
    }
}

/// `micros / parts`, rounded to cents and saturated to the `i64` range.
fn to_cents(micros: i128, parts: i128) -> i64 {
    let cents = div_round(micros, parts * MICROS_PER_CENT);
    i64::try_from(cents).unwrap_or(if cents < 0 { i64::MIN } else { i64::MAX })
}

/// Sample standard deviation (n - 1) of per-quarter sums, in cents.
/// A single quarter has no spread and yields 0.
fn std_dev_cents(sums: &[i128]) -> i64 {
    if sums.len() < 2 {
        return 0;
    }
    let n = sums.len() as f64;
    let mean = sums.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = sums
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    (variance.sqrt() / MICROS_PER_CENT as f64).round() as i64
}

/// Group valid records by `(legal_name, state)` and compute total, mean and
/// sample standard deviation over the per-quarter sums.
///
/// Only records with `amount_is_valid` contribute. Output is sorted by total
/// descending; ties keep first-encountered group order.
pub fn aggregate(records: &[JoinedExpenseRecord]) -> Vec<AggregateStat> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for record in records.iter().filter(|r| r.flags.amount_is_valid) {
        let key = (record.legal_name.clone(), record.state.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                legal_name: record.legal_name.clone(),
                state: record.state.clone(),
                ..Group::default()
            });
            groups.len() - 1
        });
        *groups[slot]
            .quarters
            .entry((record.year, record.quarter))
            .or_insert(0) += i128::from(record.amount);
    }

    // Sort on exact micro totals so rounding never reorders groups.
    let mut ranked: Vec<(i128, AggregateStat)> = groups
        .into_iter()
        .map(|group| {
            let total = group.total_micros();
            let sums: Vec<i128> = group.quarters.values().copied().collect();
            let quarters = sums.len() as i128;
            let stat = AggregateStat {
                legal_name: group.legal_name,
                state: group.state,
                total_cents: to_cents(total, 1),
                mean_quarterly_cents: to_cents(total, quarters),
                std_dev_quarterly_cents: std_dev_cents(&sums),
            };
            (total, stat)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, stat)| stat).collect()
}
