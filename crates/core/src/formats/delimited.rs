//! Delimited-text decoder (CSV, semicolon-separated, TSV).
//!
//! The first row is the header. Short rows are padded with empty strings,
//! cells beyond the header width are dropped, and quoted cells may contain
//! the delimiter or line breaks.

use super::{decode_text, RawRecord};
use crate::error::ImportError;

/// Delimiters considered when sniffing the header line, in tie-break order.
pub const CANDIDATE_DELIMITERS: &[u8] = b",;\t";

/// Output of [`parse_delimited`].
#[derive(Debug, Clone)]
pub struct DelimitedDocument {
    /// Header names, unique and in column order.
    pub headers: Vec<String>,
    /// One record per non-blank data row, in file order.
    pub rows: Vec<RawRecord>,
    /// The delimiter that was detected.
    pub delimiter: u8,
}

/// Decode delimited text into headers and records.
///
/// Records are read one at a time straight into the output, so only one
/// copy of the row data is held. Exceeding `max_rows` aborts with
/// [`ImportError::RowLimitExceeded`].
pub fn parse_delimited(
    bytes: &[u8],
    max_rows: Option<usize>,
) -> Result<DelimitedDocument, ImportError> {
    let text = decode_text(bytes)?;
    if text.trim().is_empty() {
        return Err(ImportError::UnreadableFile("file is empty".to_string()));
    }

    let delimiter = sniff_delimiter(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::UnreadableFile(format!("cannot read header row: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if raw_headers.iter().all(String::is_empty) {
        return Err(ImportError::UnreadableFile(
            "no columns detected in header row".to_string(),
        ));
    }
    let headers = disambiguate_headers(raw_headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| ImportError::UnreadableFile(format!("malformed row: {e}")))?;

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if let Some(limit) = max_rows {
            if rows.len() >= limit {
                return Err(ImportError::RowLimitExceeded {
                    rows: rows.len() + 1,
                    limit,
                });
            }
        }

        let row: RawRecord = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(DelimitedDocument {
        headers,
        rows,
        delimiter,
    })
}

/// Pick the delimiter that occurs most often, outside quotes, on the header
/// line. Ties and single-column files fall back to comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default();

    let mut counts = [0usize; 3];
    let mut in_quotes = false;
    for b in header_line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(i) = CANDIDATE_DELIMITERS.iter().position(|d| *d == b) {
                counts[i] += 1;
            }
        }
    }

    let mut best = 0;
    for i in 1..counts.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    CANDIDATE_DELIMITERS[best]
}

/// Name blank headers `column_<n>` and suffix repeats with ` (2)`, ` (3)`...
fn disambiguate_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, header) in raw.into_iter().enumerate() {
        let base = if header.is_empty() {
            format!("column_{}", i + 1)
        } else {
            header
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while out.contains(&candidate) {
            candidate = format!("{base} ({n})");
            n += 1;
        }
        out.push(candidate);
    }
    out
}
