//! Turns mapped data rows into canonical campaign records.

use crate::column_mapper::ColumnMapping;
use crate::error::ImportError;
use crate::numeric::parse_cell;
use crate::schema::{Cell, ColumnRole, PerformanceCampaign, RawMatrix};
use crate::sheet_parser::excel_serial_to_date;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Substrings that mark a summary row rather than a campaign.
const NOISE_MARKERS: [&str; 2] = ["total", "resumo"];

/// Why rows were dropped during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipStats {
    pub short: usize,
    pub blank: usize,
    pub noise: usize,
    pub repeated_header: usize,
}

impl SkipStats {
    pub fn total(&self) -> usize {
        self.short + self.blank + self.noise + self.repeated_header
    }
}

/// Records pulled from one source, plus the reporting period they cover.
#[derive(Debug, Clone)]
pub struct ExtractedCampaigns {
    pub campaigns: Vec<PerformanceCampaign>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub skipped: SkipStats,
}

/// Walk every row after `header_index` and build campaign records.
pub fn extract_campaigns(
    rows: &RawMatrix,
    header_index: usize,
    mapping: &ColumnMapping,
) -> Result<ExtractedCampaigns, ImportError> {
    let Some(name_idx) = mapping.get(ColumnRole::Name) else {
        return Err(ImportError::SchemaUnresolved {
            missing: vec![ColumnRole::Name],
        });
    };
    // Trailing blank cells are trimmed by the readers, so a row may end at the
    // last required column and still carry its name.
    let min_len = mapping.required_max_index();

    let header_cells: Vec<String> = rows
        .get(header_index)
        .map(|r| r.iter().map(|c| c.as_text().trim().to_string()).collect())
        .unwrap_or_default();

    let mut campaigns = Vec::new();
    let mut skipped = SkipStats::default();
    let mut period_start: Option<String> = None;
    let mut period_end: Option<String> = None;

    for row in rows.iter().skip(header_index + 1) {
        if row.len() < min_len {
            skipped.short += 1;
            continue;
        }

        let name = row
            .get(name_idx)
            .map(|c| c.as_text().trim().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            skipped.blank += 1;
            continue;
        }
        if is_noise_name(&name) {
            skipped.noise += 1;
            continue;
        }
        if header_cells.iter().any(|h| *h == name) {
            skipped.repeated_header += 1;
            continue;
        }

        let campaign = build_campaign(row, name, mapping);

        if let Some(start) = cell_for(row, mapping, ColumnRole::PeriodStart).and_then(normalize_date) {
            if period_start.as_ref().map_or(true, |cur| start < *cur) {
                period_start = Some(start);
            }
        }
        if let Some(end) = cell_for(row, mapping, ColumnRole::PeriodEnd).and_then(normalize_date) {
            if period_end.as_ref().map_or(true, |cur| end > *cur) {
                period_end = Some(end);
            }
        }

        campaigns.push(campaign);
    }

    debug!("Skipped rows: {:?}", skipped);

    if campaigns.is_empty() {
        return Err(ImportError::NoDataExtracted);
    }

    info!(
        "Extracted {} campaign(s), skipped {} row(s)",
        campaigns.len(),
        skipped.total()
    );

    Ok(ExtractedCampaigns {
        campaigns,
        period_start,
        period_end,
        skipped,
    })
}

fn is_noise_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "null" || NOISE_MARKERS.iter().any(|m| lower.contains(m))
}

fn cell_for<'a>(row: &'a [Cell], mapping: &ColumnMapping, role: ColumnRole) -> Option<&'a Cell> {
    mapping.get(role).and_then(|i| row.get(i))
}

fn build_campaign(row: &[Cell], name: String, mapping: &ColumnMapping) -> PerformanceCampaign {
    // Negative values (refunds, adjustments) are clamped to keep totals non-negative.
    let num = |role| cell_for(row, mapping, role).map(parse_cell).unwrap_or(0.0).max(0.0);
    let text = |role| {
        cell_for(row, mapping, role)
            .map(|c| c.as_text().trim().to_string())
            .unwrap_or_default()
    };

    let mut c = PerformanceCampaign::new(name);
    c.spend = num(ColumnRole::Spend);
    c.impressions = num(ColumnRole::Impressions);
    c.reach = num(ColumnRole::Reach);
    c.frequency = num(ColumnRole::Frequency);
    c.clicks = num(ColumnRole::Clicks);
    c.ctr = num(ColumnRole::Ctr);
    c.cpc = num(ColumnRole::Cpc);
    c.cpm = num(ColumnRole::Cpm);
    c.results = num(ColumnRole::Results);
    c.cost_per_result = num(ColumnRole::CostPerResult);
    c.result_type = clean_result_type(&text(ColumnRole::ResultType));

    let status = text(ColumnRole::Status);
    c.status = (!status.is_empty()).then_some(status);

    derive_rates(&mut c);
    c
}

/// Fill in rate metrics the export left empty.
pub fn derive_rates(c: &mut PerformanceCampaign) {
    if c.ctr == 0.0 && c.impressions > 0.0 && c.clicks > 0.0 {
        c.ctr = c.clicks / c.impressions * 100.0;
    }
    if c.cpc == 0.0 && c.spend > 0.0 && c.clicks > 0.0 {
        c.cpc = c.spend / c.clicks;
    }
    if c.cpm == 0.0 && c.spend > 0.0 && c.impressions > 0.0 {
        c.cpm = c.spend / c.impressions * 1000.0;
    }
    if c.cost_per_result == 0.0 && c.spend > 0.0 && c.results > 0.0 {
        c.cost_per_result = c.spend / c.results;
    }
}

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*(\([^()]*\)|\[[^\[\]]*\])\s*$").expect("valid annotation regex"))
}

/// Strip trailing `(...)` / `[...]` annotations: "Compras (Pixel) [7d]" → "Compras".
pub fn clean_result_type(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    loop {
        let stripped = annotation_re().replace(&s, "").trim().to_string();
        if stripped == s || stripped.is_empty() {
            return s;
        }
        s = stripped;
    }
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid iso date regex"))
}

fn slash_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})").expect("valid date regex"))
}

/// Normalize a period cell to `YYYY-MM-DD`.
///
/// Slash dates are read day-first (pt-BR) unless only the month-first reading
/// is valid.
pub fn normalize_date(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Number(serial) => excel_serial_to_date(*serial),
        Cell::Text(s) => {
            let s = s.trim();
            if let Some(caps) = iso_date_re().captures(s) {
                let y: i32 = caps[1].parse().ok()?;
                let m: u32 = caps[2].parse().ok()?;
                let d: u32 = caps[3].parse().ok()?;
                return valid_date(y, m, d);
            }
            if let Some(caps) = slash_date_re().captures(s) {
                let a: u32 = caps[1].parse().ok()?;
                let b: u32 = caps[2].parse().ok()?;
                let y: i32 = caps[3].parse().ok()?;
                return valid_date(y, b, a).or_else(|| valid_date(y, a, b));
            }
            None
        }
    }
}

fn valid_date(year: i32, month: u32, day: u32) -> Option<String> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let max_day = crate::schema::days_in_months(year)[(month - 1) as usize];
    if day == 0 || day > max_day {
        return None;
    }
    Some(format!("{:04}-{:02}-{:02}", year, month, day))
}
