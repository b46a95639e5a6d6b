//! Header row detection.
//!
//! Exports often start with a title, filter summary or blank lines before the
//! real header, so the header is picked by keyword score rather than position.

use crate::schema::{ColumnRole, RawMatrix};
use crate::synonyms::{normalize_header, SynonymDictionary};
use tracing::debug;

/// Weighted roles used to score a candidate header row.
const SCORED_ROLES: [(ColumnRole, u32); 3] = [
    (ColumnRole::Name, 2),
    (ColumnRole::Spend, 1),
    (ColumnRole::Results, 1),
];

const MAX_SCORE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLocation {
    pub index: usize,
    pub score: u32,
}

/// Find the most header-like row within the first `scan_rows` rows.
/// Falls back to row 0 when nothing scores.
pub fn locate_header(rows: &RawMatrix, dict: &SynonymDictionary, scan_rows: usize) -> HeaderLocation {
    let mut best = HeaderLocation { index: 0, score: 0 };

    for (index, row) in rows.iter().enumerate().take(scan_rows) {
        let score = score_row(row.iter().map(|c| normalize_header(&c.as_text())), dict);
        if score > best.score {
            best = HeaderLocation { index, score };
            if score == MAX_SCORE {
                break;
            }
        }
    }

    debug!("Header row located at {} (score {})", best.index, best.score);
    best
}

fn score_row(cells: impl Iterator<Item = String>, dict: &SynonymDictionary) -> u32 {
    let cells: Vec<String> = cells.collect();
    SCORED_ROLES
        .iter()
        .filter(|(role, _)| cells.iter().any(|c| dict.header_mentions(*role, c)))
        .map(|(_, weight)| weight)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cell;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    #[test]
    fn test_header_beats_status_decoy() {
        let rows = vec![
            row(&["Status"]),
            row(&["Campaign Name", "Amount Spent", "Status"]),
            row(&["Alpha", "10", "active"]),
        ];
        let loc = locate_header(&rows, &SynonymDictionary::default(), 30);
        assert_eq!(loc.index, 1);
        assert_eq!(loc.score, 3);
    }

    #[test]
    fn test_title_rows_before_header() {
        let rows = vec![
            row(&["Relatório de anúncios"]),
            row(&[""]),
            row(&["Nome da campanha", "Valor usado (BRL)", "Resultados"]),
            row(&["Campanha A", "1.500,00", "10"]),
        ];
        let loc = locate_header(&rows, &SynonymDictionary::default(), 30);
        assert_eq!(loc, HeaderLocation { index: 2, score: 4 });
    }

    #[test]
    fn test_no_scoring_row_defaults_to_zero() {
        let rows = vec![row(&["foo", "bar"]), row(&["1", "2"])];
        let loc = locate_header(&rows, &SynonymDictionary::default(), 30);
        assert_eq!(loc, HeaderLocation { index: 0, score: 0 });
    }

    #[test]
    fn test_ties_keep_first_row() {
        let rows = vec![row(&["Campaign", "x"]), row(&["Campaign name", "y"])];
        let loc = locate_header(&rows, &SynonymDictionary::default(), 30);
        assert_eq!(loc.index, 0);
    }

    #[test]
    fn test_scan_window_is_respected() {
        let mut rows = vec![row(&["x"]); 5];
        rows.push(row(&["Campaign name", "Amount spent", "Results"]));
        let loc = locate_header(&rows, &SynonymDictionary::default(), 5);
        assert_eq!(loc.index, 0);
    }
}
