//! Header classification against ordered column rules.
//!
//! A rule is a list of tiers evaluated top to bottom. The first tier with any
//! matching header decides the outcome: one match is `Found`, several are
//! `Ambiguous` (candidates in column order), none anywhere is `Absent`.
//! Headers already claimed by an earlier rule never match again.

/// One way a header can satisfy a tier. Headers are compared after
/// trimming and uppercasing.
#[derive(Debug, Clone, Copy)]
pub enum HeaderPattern {
    Exact(&'static str),
    Contains(&'static str),
    ContainsAll(&'static [&'static str]),
}

impl HeaderPattern {
    pub fn matches(&self, header: &str) -> bool {
        match self {
            Self::Exact(name) => header == *name,
            Self::Contains(token) => header.contains(token),
            Self::ContainsAll(tokens) => tokens.iter().all(|t| header.contains(t)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub tiers: &'static [&'static [HeaderPattern]],
    /// Substrings that disqualify a header regardless of tier.
    pub exclude: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMatch {
    Found(usize),
    Ambiguous(Vec<usize>),
    Absent,
}

impl ColumnMatch {
    /// Pick a single column: the found one, or the first candidate in column
    /// order when ambiguous.
    pub fn resolve(&self) -> Option<usize> {
        match self {
            Self::Found(idx) => Some(*idx),
            Self::Ambiguous(candidates) => candidates.first().copied(),
            Self::Absent => None,
        }
    }
}

/// Classify `headers` (already normalized) against `rule`, skipping `claimed`.
pub fn classify(headers: &[String], rule: &ColumnRule, claimed: &[usize]) -> ColumnMatch {
    for tier in rule.tiers {
        let candidates: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !claimed.contains(idx))
            .filter(|(_, h)| !rule.exclude.iter().any(|x| h.contains(x)))
            .filter(|(_, h)| tier.iter().any(|p| p.matches(h)))
            .map(|(idx, _)| idx)
            .collect();

        match candidates.len() {
            0 => continue,
            1 => return ColumnMatch::Found(candidates[0]),
            _ => return ColumnMatch::Ambiguous(candidates),
        }
    }
    ColumnMatch::Absent
}

/// Classify and resolve in one step, logging ambiguity.
pub fn resolve_column(
    headers: &[String],
    rule: &ColumnRule,
    claimed: &[usize],
    field: &str,
) -> Option<usize> {
    let outcome = classify(headers, rule, claimed);
    if let ColumnMatch::Ambiguous(ref candidates) = outcome {
        let names: Vec<&str> = candidates.iter().map(|&i| headers[i].as_str()).collect();
        log::warn!(
            "ambiguous {field} column: candidates [{}], using '{}'",
            names.join(", "),
            names[0]
        );
    }
    outcome.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use HeaderPattern::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const VALUE: ColumnRule = ColumnRule {
        tiers: &[
            &[Exact("VL_SALDO_FINAL"), Exact("SALDO_FINAL")],
            &[Exact("VALOR"), Exact("VL_MOVIMENTO")],
        ],
        exclude: &[],
    };

    #[test]
    fn earlier_tier_wins_over_column_order() {
        let h = headers(&["VL_MOVIMENTO", "DESCRICAO", "VL_SALDO_FINAL"]);
        assert_eq!(classify(&h, &VALUE, &[]), ColumnMatch::Found(2));
    }

    #[test]
    fn fallback_tier_used_when_first_is_empty() {
        let h = headers(&["VL_MOVIMENTO", "DESCRICAO"]);
        assert_eq!(classify(&h, &VALUE, &[]), ColumnMatch::Found(0));
    }

    #[test]
    fn two_matches_in_one_tier_are_ambiguous() {
        let h = headers(&["SALDO_FINAL", "VL_SALDO_FINAL"]);
        let m = classify(&h, &VALUE, &[]);
        assert_eq!(m, ColumnMatch::Ambiguous(vec![0, 1]));
        assert_eq!(m.resolve(), Some(0));
    }

    #[test]
    fn claimed_and_excluded_columns_are_skipped() {
        let rule = ColumnRule {
            tiers: &[&[ContainsAll(&["REGISTRO", "OPERADORA"])]],
            exclude: &["DATA"],
        };
        let h = headers(&["DATA_REGISTRO_OPERADORA", "REGISTRO_OPERADORA"]);
        assert_eq!(classify(&h, &rule, &[]), ColumnMatch::Found(1));
        assert_eq!(classify(&h, &rule, &[1]), ColumnMatch::Absent);
    }

    #[test]
    fn nothing_matches_is_absent() {
        let h = headers(&["A", "B"]);
        assert_eq!(classify(&h, &VALUE, &[]), ColumnMatch::Absent);
        assert_eq!(ColumnMatch::Absent.resolve(), None);
    }
}
