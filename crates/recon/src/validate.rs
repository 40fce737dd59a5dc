//! Per-record data-quality flags.

use crate::model::{QualityFlags, CNPJ_NOT_FOUND};

const CNPJ_LEN: usize = 14;
const FIRST_CHECK_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_CHECK_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Substring marking a legal name that was never located.
const NOT_LOCATED_MARKER: &str = "NAO LOCALIZADA";

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Modulus-11 CNPJ check. Formatting characters are ignored and short
/// numbers are left-padded with zeros.
pub fn cnpj_is_valid(cnpj: &str) -> bool {
    if cnpj.contains(CNPJ_NOT_FOUND) {
        return false;
    }
    let mut digits: Vec<u32> = cnpj.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.is_empty() || digits.len() > CNPJ_LEN {
        return false;
    }
    while digits.len() < CNPJ_LEN {
        digits.insert(0, 0);
    }
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    let first = check_digit(&digits[..12], &FIRST_CHECK_WEIGHTS);
    let mut first_thirteen = digits[..12].to_vec();
    first_thirteen.push(first);
    let second = check_digit(&first_thirteen, &SECOND_CHECK_WEIGHTS);

    digits[12] == first && digits[13] == second
}

pub fn legal_name_is_valid(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && !trimmed.to_uppercase().contains(NOT_LOCATED_MARKER)
}

pub fn amount_is_valid(amount_micros: i64) -> bool {
    amount_micros > 0
}

pub fn quality_flags(cnpj: &str, legal_name: &str, amount_micros: i64) -> QualityFlags {
    QualityFlags {
        cnpj_is_valid: cnpj_is_valid(cnpj),
        legal_name_is_valid: legal_name_is_valid(legal_name),
        amount_is_valid: amount_is_valid(amount_micros),
    }
}
