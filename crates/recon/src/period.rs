//! Reporting-period resolution: from a date cell, or from the directory path.

use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::model::Quarter;

/// Date layouts seen in the corpus. Day-first wins over month-first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a period-date cell. Empty or unrecognized text yields `None`.
pub fn parse_period_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// `(year, quarter)` of a calendar date.
pub fn period_of(date: NaiveDate) -> (i32, Quarter) {
    // month() is always 1..=12
    let quarter = Quarter::from_month(date.month()).unwrap_or(Quarter::Q1);
    (date.year(), quarter)
}

/// Derive the period from the directory convention `.../<YYYY>/<n>T/...`.
///
/// A segment of exactly four digits is a year; the segment right after it,
/// with a leading or trailing `T` marker removed, must be a quarter number.
/// Every year-like segment is tried in order until one is followed by a
/// valid quarter.
pub fn period_from_path(path: &Path) -> Option<(i32, Quarter)> {
    let segments: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    segments.windows(2).find_map(|pair| {
        let year = parse_year_segment(&pair[0])?;
        let quarter = parse_quarter_segment(&pair[1])?;
        Some((year, quarter))
    })
}

fn parse_year_segment(segment: &str) -> Option<i32> {
    if segment.len() == 4 && segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

fn parse_quarter_segment(segment: &str) -> Option<Quarter> {
    let stripped = segment.trim().trim_matches(|c| c == 't' || c == 'T').trim();
    if stripped.is_empty() || !stripped.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stripped.parse().ok().and_then(Quarter::from_number)
}
