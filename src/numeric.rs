//! Locale-tolerant number parsing for spreadsheet cells.
//!
//! Handles both `1.234,56` (pt-BR) and `1,234.56` (en-US) without being told
//! which locale the export came from. Never fails: anything unparseable is `0`.

use crate::schema::Cell;

/// Parse a raw cell into a finite float, `0.0` on any failure.
pub fn parse_cell(cell: &Cell) -> f64 {
    match cell {
        Cell::Empty => 0.0,
        // Already decoded by the spreadsheet reader; re-parsing its string form
        // would read `1000.125` as thousands-separated.
        Cell::Number(f) if f.is_finite() => *f,
        Cell::Number(_) => 0.0,
        Cell::Text(s) => parse_number(s),
    }
}

/// Parse a free-form numeric string, `0.0` on any failure.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if cleaned.is_empty() {
        return 0.0;
    }

    let has_comma = cleaned.contains(',');
    let has_dot = cleaned.contains('.');

    let canonical = match (has_comma, has_dot) {
        (true, true) => {
            let last_comma = cleaned.rfind(',').unwrap_or(0);
            let last_dot = cleaned.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (true, false) => {
            let trailing = cleaned.rsplit(',').next().unwrap_or("");
            if trailing.len() <= 2 {
                comma_as_decimal(&cleaned)
            } else {
                cleaned.replace(',', "")
            }
        }
        (false, true) => {
            let groups: Vec<&str> = cleaned.split('.').collect();
            let trailing = groups.last().copied().unwrap_or("");
            if groups.len() > 1 && trailing.len() == 3 && trailing.chars().all(|c| c.is_ascii_digit()) {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (false, false) => cleaned,
    };

    match canonical.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Turn the last comma into the decimal point and drop any earlier ones.
fn comma_as_decimal(s: &str) -> String {
    match s.rfind(',') {
        Some(idx) => format!("{}.{}", s[..idx].replace(',', ""), &s[idx + 1..]),
        None => s.to_string(),
    }
}

/// True if the cell carries a number (as decoded or as digits in text).
pub fn looks_numeric(cell: &Cell) -> bool {
    match cell {
        Cell::Number(f) => f.is_finite(),
        Cell::Empty => false,
        Cell::Text(s) => {
            let t = s.trim();
            t.chars().any(|c| c.is_ascii_digit())
                && t.chars().all(|c| {
                    c.is_ascii_digit()
                        || c.is_whitespace()
                        || matches!(c, ',' | '.' | '-' | '+' | '%' | '$' | 'R' | '€' | '£')
                })
        }
    }
}
