// Spreadsheet import (xlsx, xls)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use healthops_recon::RawTable;

/// Import the first worksheet. Its first non-empty row is the header.
pub fn import(path: &Path) -> Result<RawTable, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open spreadsheet {}: {}", path.display(), e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let Some(first) = sheet_names.first() else {
        return Err(format!("{}: spreadsheet contains no sheets", path.display()));
    };
    if sheet_names.len() > 1 {
        log::debug!(
            "{}: reading sheet '{}', ignoring {} others",
            path.display(),
            first,
            sheet_names.len() - 1
        );
    }

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| format!("Failed to read sheet '{}': {}", first, e))?;

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(cell_to_text).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        match headers {
            None => headers = Some(cells),
            Some(_) => rows.push(cells),
        }
    }

    Ok(RawTable::new(headers.unwrap_or_default(), rows))
}

/// Render one cell as the text a delimited export of the same sheet would hold.
fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Format nicely: integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => serial_to_iso(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Excel 1900-system serial to an ISO date. The time of day is dropped.
fn serial_to_iso(serial: f64) -> String {
    // 1899-12-30 absorbs the 1900 leap-year bug for every serial after Feb 1900
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30);
    match epoch.and_then(|e| e.checked_add_signed(Duration::days(serial.floor() as i64))) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => format!("{}", serial),
    }
}
