// Delimited-text import

use std::io::Read;
use std::path::Path;

use healthops_recon::RawTable;

/// Delimiter used when sniffing is inconclusive.
pub const FALLBACK_DELIMITER: u8 = b';';

pub fn import(path: &Path) -> Result<RawTable, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

/// Detect the field delimiter by checking consistency across the first few lines.
///
/// For each candidate (semicolon, comma), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins; ties and
/// inconclusive samples go to semicolon.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b';', b','];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    if sample_lines.is_empty() {
        return FALLBACK_DELIMITER;
    }

    let mut best = FALLBACK_DELIMITER;
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("{}: {e}", path.display()))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Government exports are mostly Windows-1252 / Latin-1
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            log::debug!("{}: decoded as Windows-1252", path.display());
            decoded.into_owned()
        }
    };
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Parse delimited text; the first record is the header row. Malformed
/// records are skipped.
pub fn import_from_string(content: &str, delimiter: u8) -> Result<RawTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                log::debug!("skipping malformed record: {e}");
                continue;
            }
        };
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        match headers {
            None => headers = Some(fields),
            Some(_) => rows.push(fields),
        }
    }

    if skipped > 0 {
        log::warn!("skipped {skipped} malformed records");
    }
    Ok(RawTable::new(headers.unwrap_or_default(), rows))
}
