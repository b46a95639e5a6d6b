//! Maps canonical fields to column indices.
//!
//! Resolution is two-phase:
//! 1. **Synonym**: exact header match, then containment (header contains a
//!    synonym, or a synonym starts with the header). Cells that look like
//!    joined data (`;` or 3+ commas) are never treated as headers.
//! 2. **Statistical**: when `name`/`spend` (or both `impressions` and `clicks`)
//!    are still missing, column statistics over a few data rows decide.

use crate::error::ImportError;
use crate::numeric::{looks_numeric, parse_cell};
use crate::schema::{Cell, ColumnRole, RawMatrix};
use crate::synonyms::{normalize_header, SynonymDictionary};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Containment pass order: roles whose synonyms embed other roles' words
/// (`custo por resultado`, `cpc (custo por clique)`) claim their column first.
const CONTAINMENT_ORDER: [ColumnRole; 15] = [
    ColumnRole::Status,
    ColumnRole::ResultType,
    ColumnRole::CostPerResult,
    ColumnRole::Ctr,
    ColumnRole::Cpc,
    ColumnRole::Cpm,
    ColumnRole::PeriodStart,
    ColumnRole::PeriodEnd,
    ColumnRole::Frequency,
    ColumnRole::Reach,
    ColumnRole::Impressions,
    ColumnRole::Clicks,
    ColumnRole::Results,
    ColumnRole::Spend,
    ColumnRole::Name,
];

/// Shortest header allowed to match inside a longer synonym.
const MIN_REVERSE_HEADER_CHARS: usize = 3;

/// Text ratio above which a column counts as a label column.
const NAME_TEXT_RATIO: f64 = 0.8;
/// Text ratio below which a column counts as numeric.
const NUMERIC_TEXT_RATIO: f64 = 0.5;

/// How a role was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    Contains,
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub via: Resolution,
}

/// Role → column index, fixed once mapping completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    columns: BTreeMap<ColumnRole, ResolvedColumn>,
}

impl ColumnMapping {
    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        self.columns.get(&role).map(|c| c.index)
    }

    pub fn resolution(&self, role: ColumnRole) -> Option<Resolution> {
        self.columns.get(&role).map(|c| c.via)
    }

    pub fn is_resolved(&self, role: ColumnRole) -> bool {
        self.columns.contains_key(&role)
    }

    /// Highest column index among the required roles.
    pub fn required_max_index(&self) -> usize {
        ColumnRole::REQUIRED
            .iter()
            .filter_map(|r| self.get(*r))
            .max()
            .unwrap_or(0)
    }

    fn claimed(&self, index: usize) -> bool {
        self.columns.values().any(|c| c.index == index)
    }

    fn assign(&mut self, role: ColumnRole, index: usize, via: Resolution) {
        debug!("Column {} -> {} ({:?})", index, role, via);
        self.columns.insert(role, ResolvedColumn { index, via });
    }

    fn missing(&self, roles: &[ColumnRole]) -> Vec<ColumnRole> {
        roles.iter().copied().filter(|r| !self.is_resolved(*r)).collect()
    }
}

/// Resolve every role against the header row, falling back to column
/// statistics over the first `sample_rows` data rows.
pub fn map_columns(
    header: &[Cell],
    data_rows: &[Vec<Cell>],
    dict: &SynonymDictionary,
    sample_rows: usize,
) -> Result<ColumnMapping, ImportError> {
    let headers: Vec<String> = header.iter().map(|c| normalize_header(&c.as_text())).collect();
    let mut mapping = ColumnMapping::default();

    resolve_by_synonym(&headers, dict, &mut mapping);

    let needs_inference = !mapping.missing(&ColumnRole::REQUIRED).is_empty()
        || !mapping.is_resolved(ColumnRole::Impressions)
        || !mapping.is_resolved(ColumnRole::Clicks);

    if needs_inference {
        let sample: Vec<&Vec<Cell>> = data_rows.iter().take(sample_rows).collect();
        let width = sample
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        let stats = column_stats(&sample, width);
        resolve_by_statistics(&stats, &mut mapping);
    }

    let missing = mapping.missing(&ColumnRole::REQUIRED);
    if !missing.is_empty() {
        return Err(ImportError::SchemaUnresolved { missing });
    }

    for role in ColumnRole::REQUIRED {
        if mapping.resolution(role) == Some(Resolution::Inferred) {
            warn!("Required column '{}' inferred from cell values, not the header", role);
        }
    }

    info!(
        "Mapped {} column(s): {}",
        mapping.columns.len(),
        mapping
            .columns
            .iter()
            .map(|(role, c)| format!("{}={}", role, c.index))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(mapping)
}

fn resolve_by_synonym(headers: &[String], dict: &SynonymDictionary, mapping: &mut ColumnMapping) {
    // Exact pass
    for role in ColumnRole::ALL {
        let synonyms = dict.get(role);
        let found = headers
            .iter()
            .enumerate()
            .find(|(i, h)| !mapping.claimed(*i) && synonyms.iter().any(|s| s == *h));
        if let Some((i, _)) = found {
            mapping.assign(role, i, Resolution::Exact);
        }
    }

    // Header contains synonym
    for role in CONTAINMENT_ORDER {
        if mapping.is_resolved(role) {
            continue;
        }
        let synonyms = dict.get(role);
        let found = headers.iter().enumerate().find(|(i, h)| {
            !mapping.claimed(*i)
                && is_header_like(h)
                && synonyms.iter().any(|s| h.contains(s.as_str()))
        });
        if let Some((i, _)) = found {
            mapping.assign(role, i, Resolution::Contains);
        }
    }

    // Truncated headers found inside a synonym. Prefix matches claim columns
    // before infix ones so "resultado" lands on results, not cost per result.
    let prefix = |s: &str, h: &str| s.starts_with(h);
    let infix = |s: &str, h: &str| s.contains(h);
    for inside in [&prefix as &dyn Fn(&str, &str) -> bool, &infix] {
        for role in CONTAINMENT_ORDER {
            if mapping.is_resolved(role) {
                continue;
            }
            let synonyms = dict.get(role);
            let found = headers.iter().enumerate().find(|(i, h)| {
                !mapping.claimed(*i)
                    && h.chars().count() >= MIN_REVERSE_HEADER_CHARS
                    && is_header_like(h)
                    && synonyms.iter().any(|s| inside(s, h))
            });
            if let Some((i, _)) = found {
                mapping.assign(role, i, Resolution::Contains);
            }
        }
    }
}

/// Rejects cells that look like a joined data row rather than a label.
fn is_header_like(header: &str) -> bool {
    !header.is_empty() && !header.contains(';') && header.matches(',').count() <= 2
}

/// Per-column statistics over a sample of data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub index: usize,
    /// Mean over numeric cells only.
    pub avg: f64,
    /// Fraction of non-empty cells that are not numeric.
    pub text_ratio: f64,
    pub numeric_cells: usize,
}

impl ColumnStats {
    fn is_numeric(&self) -> bool {
        self.numeric_cells > 0 && self.text_ratio < NUMERIC_TEXT_RATIO
    }
}

pub fn column_stats(sample: &[&Vec<Cell>], width: usize) -> Vec<ColumnStats> {
    (0..width)
        .filter_map(|index| {
            let cells: Vec<&Cell> = sample
                .iter()
                .filter_map(|row| row.get(index))
                .filter(|c| !c.is_blank())
                .collect();
            if cells.is_empty() {
                return None;
            }

            let numeric: Vec<f64> = cells
                .iter()
                .filter(|c| looks_numeric(c))
                .map(|c| parse_cell(c))
                .collect();

            let avg = if numeric.is_empty() {
                0.0
            } else {
                numeric.iter().sum::<f64>() / numeric.len() as f64
            };
            let text_ratio = (cells.len() - numeric.len()) as f64 / cells.len() as f64;

            Some(ColumnStats {
                index,
                avg,
                text_ratio,
                numeric_cells: numeric.len(),
            })
        })
        .collect()
}

fn resolve_by_statistics(stats: &[ColumnStats], mapping: &mut ColumnMapping) {
    if !mapping.is_resolved(ColumnRole::Name) {
        if let Some(s) = stats.iter().find(|s| {
            !mapping.claimed(s.index) && s.text_ratio > NAME_TEXT_RATIO && s.avg.abs() < f64::EPSILON
        }) {
            mapping.assign(ColumnRole::Name, s.index, Resolution::Inferred);
        }
    }

    let mut numeric: Vec<&ColumnStats> = stats
        .iter()
        .filter(|s| s.is_numeric() && s.avg > 0.0 && !mapping.claimed(s.index))
        .collect();
    // Stable sort keeps the leftmost column first on equal averages.
    numeric.sort_by(|a, b| b.avg.total_cmp(&a.avg));

    let mut remaining = numeric.into_iter();

    if !mapping.is_resolved(ColumnRole::Spend) {
        if let Some(s) = remaining.next() {
            mapping.assign(ColumnRole::Spend, s.index, Resolution::Inferred);
        }
    }

    if !mapping.is_resolved(ColumnRole::Impressions) && !mapping.is_resolved(ColumnRole::Clicks) {
        if let Some(s) = remaining.next() {
            mapping.assign(ColumnRole::Impressions, s.index, Resolution::Inferred);
        }
        if let Some(s) = remaining.next() {
            mapping.assign(ColumnRole::Clicks, s.index, Resolution::Inferred);
        }
    }
}

/// Convenience wrapper for callers holding a full matrix and a header index.
pub fn map_matrix(
    rows: &RawMatrix,
    header_index: usize,
    dict: &SynonymDictionary,
    sample_rows: usize,
) -> Result<ColumnMapping, ImportError> {
    let header = rows.get(header_index).map(|r| r.as_slice()).unwrap_or(&[]);
    let data = rows.get(header_index + 1..).unwrap_or(&[]);
    map_columns(header, data, dict, sample_rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    fn dict() -> SynonymDictionary {
        SynonymDictionary::default()
    }

    #[test]
    fn test_meta_ptbr_headers() {
        let header = row(&[
            "Nome da campanha",
            "Veiculação da campanha",
            "Resultados",
            "Indicador de resultados",
            "Alcance",
            "Impressões",
            "Custo por resultados",
            "Valor usado (BRL)",
            "CPM (custo por 1.000 impressões) (BRL)",
            "Cliques no link",
            "CPC (custo por clique no link) (BRL)",
            "CTR (taxa de cliques no link)",
            "Início dos relatórios",
            "Término dos relatórios",
        ]);
        let m = map_columns(&header, &[], &dict(), 9).unwrap();
        assert_eq!(m.get(ColumnRole::Name), Some(0));
        assert_eq!(m.get(ColumnRole::Status), Some(1));
        assert_eq!(m.get(ColumnRole::Results), Some(2));
        assert_eq!(m.get(ColumnRole::ResultType), Some(3));
        assert_eq!(m.get(ColumnRole::Reach), Some(4));
        assert_eq!(m.get(ColumnRole::Impressions), Some(5));
        assert_eq!(m.get(ColumnRole::CostPerResult), Some(6));
        assert_eq!(m.get(ColumnRole::Spend), Some(7));
        assert_eq!(m.get(ColumnRole::Cpm), Some(8));
        assert_eq!(m.get(ColumnRole::Clicks), Some(9));
        assert_eq!(m.get(ColumnRole::Cpc), Some(10));
        assert_eq!(m.get(ColumnRole::Ctr), Some(11));
        assert_eq!(m.get(ColumnRole::PeriodStart), Some(12));
        assert_eq!(m.get(ColumnRole::PeriodEnd), Some(13));
        assert_eq!(m.resolution(ColumnRole::Spend), Some(Resolution::Exact));
        assert_eq!(m.resolution(ColumnRole::Cpc), Some(Resolution::Contains));
    }

    #[test]
    fn test_english_headers_with_currency_suffix() {
        let header = row(&["Campaign Name", "Amount Spent (EUR)", "Link Clicks", "Impressions"]);
        let m = map_columns(&header, &[], &dict(), 9).unwrap();
        assert_eq!(m.get(ColumnRole::Name), Some(0));
        assert_eq!(m.get(ColumnRole::Spend), Some(1));
        assert_eq!(m.resolution(ColumnRole::Spend), Some(Resolution::Contains));
        assert_eq!(m.get(ColumnRole::Clicks), Some(2));
    }

    #[test]
    fn test_truncated_header_matches_synonym_prefix() {
        let header = row(&["Nome", "Valor"]);
        let m = map_columns(&header, &[], &dict(), 9).unwrap();
        assert_eq!(m.get(ColumnRole::Name), Some(0));
        assert_eq!(m.get(ColumnRole::Spend), Some(1));
    }

    #[test]
    fn test_truncated_header_matches_inside_synonym() {
        let header = row(&["Campaign name", "Spent", "Resultado", "Por resultado"]);
        let m = map_columns(&header, &[], &dict(), 9).unwrap();
        assert_eq!(m.get(ColumnRole::Spend), Some(1));
        assert_eq!(m.resolution(ColumnRole::Spend), Some(Resolution::Contains));
        assert_eq!(m.get(ColumnRole::Results), Some(2));
        assert_eq!(m.get(ColumnRole::CostPerResult), Some(3));
    }

    #[test]
    fn test_joined_data_row_is_not_a_header() {
        let header = row(&["campanha;1.500,00;10", "x"]);
        let data = vec![row(&["Alpha", "10"])];
        let m = map_columns(&header, &data, &dict(), 9).unwrap();
        assert_eq!(m.resolution(ColumnRole::Name), Some(Resolution::Inferred));
    }

    #[test]
    fn test_statistical_fallback_without_headers() {
        let header = row(&["col1", "col2", "col3", "col4"]);
        let data = vec![
            row(&["Alpha", "120,50", "10000", "300"]),
            row(&["Beta", "80,00", "8000", "120"]),
            row(&["Gamma", "40,00", "5000", "90"]),
        ];
        let m = map_columns(&header, &data, &dict(), 9).unwrap();
        assert_eq!(m.get(ColumnRole::Name), Some(0));
        // highest average numeric column
        assert_eq!(m.get(ColumnRole::Spend), Some(2));
        assert_eq!(m.get(ColumnRole::Impressions), Some(3));
        assert_eq!(m.get(ColumnRole::Clicks), Some(1));
        assert_eq!(m.resolution(ColumnRole::Spend), Some(Resolution::Inferred));
    }

    #[test]
    fn test_fallback_fills_impressions_and_clicks_only() {
        let header = row(&["Campaign name", "Amount spent", "a", "b"]);
        let data = vec![
            row(&["Alpha", "10", "2000", "50"]),
            row(&["Beta", "20", "4000", "70"]),
        ];
        let m = map_columns(&header, &data, &dict(), 9).unwrap();
        assert_eq!(m.resolution(ColumnRole::Spend), Some(Resolution::Exact));
        assert_eq!(m.get(ColumnRole::Impressions), Some(2));
        assert_eq!(m.get(ColumnRole::Clicks), Some(3));
    }

    #[test]
    fn test_unresolvable_schema() {
        let header = row(&["a", "b"]);
        let data = vec![row(&["x", "y"]), row(&["z", "w"])];
        let err = map_columns(&header, &data, &dict(), 9).unwrap_err();
        match err {
            ImportError::SchemaUnresolved { missing } => {
                assert_eq!(missing, vec![ColumnRole::Spend]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_stats() {
        let r1 = row(&["Alpha", "10", ""]);
        let r2 = row(&["Beta", "30", "x"]);
        let stats = column_stats(&[&r1, &r2], 3);
        assert_eq!(stats[0].text_ratio, 1.0);
        assert_eq!(stats[1].avg, 20.0);
        assert_eq!(stats[1].text_ratio, 0.0);
        assert_eq!(stats[2].numeric_cells, 0);
    }
}
