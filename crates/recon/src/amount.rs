//! Decimal amounts as integer micro-units.
//!
//! Source values arrive as text in two numeric conventions: plain
//! (`1234.56`) and Brazilian (`1.234,56`). Both are converted to `i64`
//! micro-units (1e-6 of the currency unit) without touching floating point.

/// Scale factor: 1 currency unit = 1_000_000 micro-units.
pub const MICRO_UNIT_SCALE: i64 = 1_000_000;

// ── Locale cleanup ──────────────────────────────────────────────────

/// Rewrite a whole value column from Brazilian to plain notation when any
/// cell contains a comma.
///
/// The decision is per column, not per cell: once a comma is seen anywhere,
/// every dot in the column is read as a thousands separator and dropped, and
/// commas become the decimal point. Returns whether the rewrite happened.
pub fn normalize_locale_column(values: &mut [String]) -> bool {
    if !values.iter().any(|v| v.contains(',')) {
        return false;
    }
    for value in values.iter_mut() {
        *value = value.replace('.', "").replace(',', ".");
    }
    true
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Parse plain decimal text into micro-units.
///
/// Accepts optional surrounding whitespace, an optional sign, and at most
/// one decimal point. Fractional digits beyond six are rounded half away
/// from zero. Anything else yields `None` (the value counts as unparseable).
pub fn parse_decimal_micros(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, s) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let (whole_str, frac_str) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole_str.is_empty() && frac_str.is_empty() {
        return None;
    }
    if !whole_str.bytes().all(|b| b.is_ascii_digit()) || !frac_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole_str.is_empty() { 0 } else { whole_str.parse().ok()? };

    let mut frac: i64 = 0;
    for (i, digit) in frac_str.bytes().take(6).enumerate() {
        frac += i64::from(digit - b'0') * 10i64.pow(5 - i as u32);
    }
    if let Some(&next) = frac_str.as_bytes().get(6) {
        if next >= b'5' {
            frac += 1;
        }
    }

    let abs = whole.checked_mul(MICRO_UNIT_SCALE)?.checked_add(frac)?;
    Some(if negative { -abs } else { abs })
}

// ── Rounding ────────────────────────────────────────────────────────

/// Integer division rounding half away from zero. `den` must be positive.
pub fn div_round(num: i128, den: i128) -> i128 {
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    }
}

// ── Formatting ──────────────────────────────────────────────────────

/// Render micro-units as plain decimal with 2..=6 fractional digits.
///
/// Example: 1_234_560_000 → "1234.56", 1_500 → "0.0015", -5_000_000 → "-5.00".
pub fn format_micros(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let whole = abs / MICRO_UNIT_SCALE as u64;
    let frac = format!("{:06}", abs % MICRO_UNIT_SCALE as u64);
    let trimmed = frac.trim_end_matches('0');
    let frac = if trimmed.len() < 2 { &frac[..2] } else { trimmed };
    format!("{sign}{whole}.{frac}")
}

/// Render cents with exactly two decimals: 60000 → "600.00".
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
