//! Delimiter repair for rows that decoded as a single joined cell.

use crate::schema::{row_has_content, Cell, RawMatrix};
use tracing::debug;

/// Candidate delimiters, in tie-break order after "no change".
pub const CANDIDATE_DELIMITERS: [u8; 3] = [b';', b'\t', b','];

/// Re-split single-cell rows with whichever delimiter yields the widest rows.
///
/// Only the first `probe_rows` non-empty rows are scored. Returns a new
/// matrix; the input is left untouched.
pub fn normalize(rows: &RawMatrix, probe_rows: usize) -> RawMatrix {
    let mut best = rows.clone();
    let mut best_score = average_width(&best, probe_rows);
    let mut chosen: Option<u8> = None;

    for delimiter in CANDIDATE_DELIMITERS {
        let candidate = resplit(rows, delimiter);
        let score = average_width(&candidate, probe_rows);
        if score > best_score {
            best = candidate;
            best_score = score;
            chosen = Some(delimiter);
        }
    }

    match chosen {
        Some(d) => debug!(
            "Shape repaired with delimiter {:?} (avg {:.2} columns)",
            d as char, best_score
        ),
        None => debug!("Shape left unchanged (avg {:.2} columns)", best_score),
    }

    best
}

fn resplit(rows: &RawMatrix, delimiter: u8) -> RawMatrix {
    rows.iter()
        .map(|row| match row.as_slice() {
            [Cell::Text(s)] if s.as_bytes().contains(&delimiter) => split_line(s, delimiter),
            _ => row.clone(),
        })
        .collect()
}

/// Split one line honouring quotes, so `"1,5";"2,5"` stays two cells.
fn split_line(line: &str, delimiter: u8) -> Vec<Cell> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|f| Cell::from(f.trim())).collect(),
        // Unbalanced quotes: fall back to a plain split.
        _ => line
            .split(delimiter as char)
            .map(|f| Cell::from(f.trim()))
            .collect(),
    }
}

fn average_width(rows: &RawMatrix, probe_rows: usize) -> f64 {
    let widths: Vec<usize> = rows
        .iter()
        .filter(|r| row_has_content(r))
        .take(probe_rows)
        .map(|r| r.len())
        .collect();

    if widths.is_empty() {
        return 0.0;
    }
    widths.iter().sum::<usize>() as f64 / widths.len() as f64
}
